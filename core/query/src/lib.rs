//! FILENAME: core/query/src/lib.rs
//! PURPOSE: Wire contract between the table engine and its data sources.
//! CONTEXT: A query description is a flat map of primitive values. This crate
//! owns its shape, the reserved key names, and the page/sort state encodings.

pub mod description;
pub mod paging;
pub mod value;

pub use description::{
    existence_key, QueryDescription, EXISTENCE_PREFIX, HIDDEN_COLUMNS_KEY, PAGE_KEY,
    PAGE_SIZE_KEY, SEARCH_KEY, SORT_BY_KEY, SORT_ORDER_KEY,
};
pub use paging::{
    is_valid_page_size, PageState, SortDirection, SortState, DEFAULT_PAGE_SIZE,
    PAGE_SIZE_OPTIONS,
};
pub use value::QueryValue;
