//! Shared test helpers for E2E tests.

#[path = "helpers_lsp_client.rs"]
pub mod lsp_client;
