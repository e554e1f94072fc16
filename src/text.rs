//! Text manipulation utilities.
//!
//! - Position mapping between LSP (UTF-16) and byte offsets
//! - Incremental `didChange` application

mod edits;
pub mod position;

pub use edits::apply_content_changes;
pub use position::{
    PositionMapper, convert_utf16_to_byte_in_line, utf16_column, utf16_len,
};
