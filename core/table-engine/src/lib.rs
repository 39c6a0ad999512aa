//! FILENAME: core/table-engine/src/lib.rs
//! PURPOSE: Reactive table engine.
//! CONTEXT: Typed columns with per-column filters, a free-text search, a
//! sorter and a paginator are folded into one debounced, deduplicated query
//! description. A Frame feeds that description to a DataSource (and an
//! optional FieldDiscovery) and keeps the resulting page of rows, which can
//! also be edited locally without a round trip.

pub mod cell;
pub mod column;
pub mod error;
pub mod exhaust;
pub mod field;
pub mod filter;
pub mod frame;
pub mod logging;
pub mod paging;
pub mod source;

pub use cell::{ListenerId, Observable};
pub use column::{Column, ColumnSet};
pub use error::{ConfigError, SourceError, TableError, TableResult};
pub use exhaust::exhaust_latest;
pub use field::{Field, FieldValue};
pub use filter::{
    ColumnFilter, ColumnFilterBuilder, ExistenceFilter, Filter, FilterOption, OptionLookup,
    OptionSource, PatternFilter, ValuesFilter,
};
pub use frame::{Frame, FrameOptions};
pub use logging::init_log_file;
pub use paging::{Paginator, Search, Sorter};
pub use source::{DataSource, Entity, Fetched, FieldDiscovery};

pub use query::{
    PageState, QueryDescription, QueryValue, SortDirection, SortState, PAGE_SIZE_OPTIONS,
};
