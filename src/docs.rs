//! Static Basilisk knowledge: keyword tables, reference docs, completion items.

mod completion;
mod keywords;
mod reference;

pub use completion::{completion_items, component_items, header_items};
pub use keywords::{
    BOUNDARY_DIRECTIONS, BUILTIN_FUNCTIONS, COMMON_HEADERS, CONSTANTS, CONTROL_KEYWORDS,
    FIELD_TYPES, GRID_TYPES, KeywordCategory, LOOP_VARIABLES, MPI_KEYWORDS, is_keyword,
    keyword_category,
};
pub use reference::{DOCUMENTATION, DocEntry, documentation, hover_markdown};
