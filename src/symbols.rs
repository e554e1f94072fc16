//! Regex-based outline of Basilisk sources for navigation.

mod extract;
mod index;
mod lookup;

pub use extract::{OutlineSymbol, extract_symbols};
pub use index::{IndexedSymbol, SymbolIndex};
pub use lookup::{find_references, word_at};
