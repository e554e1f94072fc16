mod completion;
mod hover;
mod navigation;
mod publish_diagnostic;

pub(crate) use publish_diagnostic::ValidationTrigger;
