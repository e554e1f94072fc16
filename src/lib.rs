pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod docs;
pub mod error;
pub mod lsp;
pub mod symbols;
pub mod text;

pub use lsp::QccLs;
