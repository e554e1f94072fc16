pub(crate) mod bridge;
mod document_state;
mod lsp_impl;
mod settings;

pub use bridge::{BridgeState, ConfigFingerprint, LaunchCommand, LaunchPlan};
pub use lsp_impl::QccLs;
pub use settings::{
    SettingsEvent, SettingsEventKind, SettingsLoadOutcome, SettingsRequest, SettingsSource,
    load_settings,
};
