#![forbid(unsafe_code)]

//! Table and filter engines for list pages.
//!
//! Pages hand a row sequence to [`TableView`] and read back the current
//! page; sorting, filtering and page navigation are pure local state.

pub mod filter;
pub mod table;

pub use filter::RecordFilter;
pub use table::{PageState, SortDirection, SortState, TableConfig, TableView};
