#![forbid(unsafe_code)]

//! Sorted, filtered and paginated views over record sequences.
//!
//! [`TableView`] owns its source rows and derives everything else from
//! `(source, filter, sort, page)`:
//!
//! ```text
//! source ──filter──▶ filtered ──stable sort──▶ sorted ──page slice──▶ view
//! ```
//!
//! The derived index lists are rebuilt eagerly on every mutation, so reads
//! never observe stale data. Whenever the number of pages shrinks the
//! current page is pulled back in range.
//!
//! # Sorting
//!
//! Values are compared with [`compare_values`]: numeric strings compare as
//! numbers and the order is total. Descending order reverses the
//! comparator, not the result, so equal keys keep their filtered order in
//! both directions.
//!
//! # Pagination
//!
//! A page size of zero disables pagination: one page holding every row.

use std::fmt;
use std::rc::Rc;

use pca_core::record::Record;
use pca_core::value::compare_values;

#[cfg(feature = "state-persistence")]
use serde::{Deserialize, Serialize};

use crate::filter::RecordFilter;

/// Default rows per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "state-persistence", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "state-persistence", serde(rename_all = "lowercase"))]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Active sort column and direction. No field means source order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "state-persistence", derive(Serialize, Deserialize))]
pub struct SortState {
    pub field: Option<String>,
    pub direction: SortDirection,
}

/// One-based current page and rows per page (0 = unpaginated).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "state-persistence", derive(Serialize, Deserialize))]
pub struct PageState {
    pub current_page: usize,
    pub page_size: usize,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            current_page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Initial table settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "state-persistence", derive(Serialize, Deserialize))]
pub struct TableConfig {
    pub sort_field: Option<String>,
    pub sort_direction: SortDirection,
    pub page_size: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            sort_field: None,
            sort_direction: SortDirection::Asc,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl TableConfig {
    #[must_use]
    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_field = Some(field.into());
        self.sort_direction = direction;
        self
    }

    #[must_use]
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

type Predicate<T> = Rc<dyn Fn(&T) -> bool>;

/// Filter → sort → paginate engine over a row sequence.
pub struct TableView<T> {
    source: Vec<T>,
    filter: Option<Predicate<T>>,
    sort: SortState,
    page: PageState,
    /// Source indices passing the filter, in source order.
    filtered: Vec<usize>,
    /// `filtered` after sorting.
    sorted: Vec<usize>,
}

impl<T: fmt::Debug> fmt::Debug for TableView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableView")
            .field("source_len", &self.source.len())
            .field("filtered", &self.filter.is_some())
            .field("sort", &self.sort)
            .field("page", &self.page)
            .finish()
    }
}

impl<T: Record> TableView<T> {
    pub fn new(source: Vec<T>, config: TableConfig) -> Self {
        let mut view = Self {
            source,
            filter: None,
            sort: SortState {
                field: config.sort_field,
                direction: config.sort_direction,
            },
            page: PageState {
                current_page: 1,
                page_size: config.page_size,
            },
            filtered: Vec::new(),
            sorted: Vec::new(),
        };
        view.recompute();
        view
    }

    /// Builder form of [`set_filter`](Self::set_filter).
    #[must_use]
    pub fn with_filter(mut self, predicate: impl Fn(&T) -> bool + 'static) -> Self {
        self.set_filter(predicate);
        self
    }

    // --- source & filter --------------------------------------------------

    #[must_use]
    pub fn source(&self) -> &[T] {
        &self.source
    }

    /// Replace the rows. Sort and page state are kept; the page is clamped
    /// if the new data has fewer pages.
    pub fn set_source(&mut self, source: Vec<T>) {
        self.source = source;
        self.recompute();
    }

    pub fn set_filter(&mut self, predicate: impl Fn(&T) -> bool + 'static) {
        self.filter = Some(Rc::new(predicate));
        self.recompute();
    }

    /// Install a [`RecordFilter`]; [`RecordFilter::All`] removes filtering.
    pub fn set_record_filter(&mut self, filter: RecordFilter) {
        if filter.is_all() {
            self.clear_filter();
        } else {
            self.set_filter(move |row: &T| filter.matches(row));
        }
    }

    pub fn clear_filter(&mut self) {
        self.filter = None;
        self.recompute();
    }

    // --- sorting ------------------------------------------------------------

    #[must_use]
    pub fn sort_field(&self) -> Option<&str> {
        self.sort.field.as_deref()
    }

    #[must_use]
    pub fn sort_direction(&self) -> SortDirection {
        self.sort.direction
    }

    #[must_use]
    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    /// Column header click: same field toggles direction, a new field sorts
    /// ascending. Returns to the first page either way.
    pub fn handle_sort(&mut self, field: &str) {
        if self.sort.field.as_deref() == Some(field) {
            self.sort.direction = self.sort.direction.toggled();
        } else {
            self.sort.field = Some(field.to_string());
            self.sort.direction = SortDirection::Asc;
        }
        self.page.current_page = 1;
        self.recompute();
    }

    pub fn set_sort(&mut self, field: Option<&str>, direction: SortDirection) {
        self.sort.field = field.map(str::to_string);
        self.sort.direction = direction;
        self.page.current_page = 1;
        self.recompute();
    }

    // --- pagination ---------------------------------------------------------

    #[must_use]
    pub fn current_page(&self) -> usize {
        self.page.current_page
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page.page_size
    }

    #[must_use]
    pub fn page_state(&self) -> PageState {
        self.page
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page.page_size = page_size;
        self.clamp_page();
    }

    /// Number of pages. Zero for an empty paginated table, always one when
    /// pagination is off.
    #[must_use]
    pub fn total_pages(&self) -> usize {
        match self.page.page_size {
            0 => 1,
            size => self.sorted.len().div_ceil(size),
        }
    }

    #[must_use]
    pub fn has_next_page(&self) -> bool {
        self.page.current_page < self.total_pages()
    }

    #[must_use]
    pub fn has_prev_page(&self) -> bool {
        self.page.current_page > 1
    }

    pub fn next_page(&mut self) {
        if self.has_next_page() {
            self.page.current_page += 1;
        }
    }

    pub fn prev_page(&mut self) {
        if self.has_prev_page() {
            self.page.current_page -= 1;
        }
    }

    /// Jump to `page`, clamped into `1..=total_pages`.
    pub fn go_to_page(&mut self, page: i64) {
        let last = i64::try_from(self.total_pages()).unwrap_or(i64::MAX);
        let page = page.min(last).max(1);
        self.page.current_page = usize::try_from(page).unwrap_or(1);
    }

    pub fn reset_pagination(&mut self) {
        self.page.current_page = 1;
    }

    // --- derived output -----------------------------------------------------

    /// Rows after filtering and sorting.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.sorted.len()
    }

    #[must_use]
    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    #[must_use]
    pub fn start_index(&self) -> usize {
        match self.page.page_size {
            0 => 0,
            size => (self.page.current_page - 1) * size,
        }
    }

    #[must_use]
    pub fn end_index(&self) -> usize {
        match self.page.page_size {
            0 => self.sorted.len(),
            size => (self.page.current_page * size).min(self.sorted.len()),
        }
    }

    #[must_use]
    pub fn items_in_page(&self) -> usize {
        self.end_index().saturating_sub(self.start_index())
    }

    /// Rows of the current page.
    #[must_use]
    pub fn view(&self) -> Vec<&T> {
        let start = self.start_index().min(self.sorted.len());
        self.sorted[start..self.end_index().max(start)]
            .iter()
            .map(|&i| &self.source[i])
            .collect()
    }

    /// Every row after filtering and sorting, ignoring pagination.
    #[must_use]
    pub fn sorted(&self) -> Vec<&T> {
        self.sorted.iter().map(|&i| &self.source[i]).collect()
    }

    /// Rows passing the filter, in source order.
    #[must_use]
    pub fn filtered(&self) -> Vec<&T> {
        self.filtered.iter().map(|&i| &self.source[i]).collect()
    }

    fn recompute(&mut self) {
        self.filtered = match &self.filter {
            Some(predicate) => (0..self.source.len())
                .filter(|&i| predicate(&self.source[i]))
                .collect(),
            None => (0..self.source.len()).collect(),
        };

        let mut sorted = self.filtered.clone();
        if let Some(field) = &self.sort.field {
            let keys: Vec<_> = self.source.iter().map(|row| row.field(field)).collect();
            let direction = self.sort.direction;
            // `sort_by` is stable.
            sorted.sort_by(|&a, &b| {
                let ord = compare_values(&keys[a], &keys[b]);
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }
        self.sorted = sorted;
        self.clamp_page();

        #[cfg(feature = "tracing")]
        tracing::trace!(
            target: "pca.table",
            source = self.source.len(),
            filtered = self.filtered.len(),
            sort_field = self.sort.field.as_deref(),
            page = self.page.current_page,
            total_pages = self.total_pages(),
            "table recomputed"
        );
    }

    fn clamp_page(&mut self) {
        let total = self.total_pages();
        if self.page.current_page > total {
            self.page.current_page = total.max(1);
        }
        if self.page.current_page == 0 {
            self.page.current_page = 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn rows(n: usize) -> Vec<Value> {
        (1..=n).map(|i| json!({"id": i, "name": format!("row {i}")})).collect()
    }

    #[test]
    fn defaults() {
        let table = TableView::new(rows(12), TableConfig::default());
        assert_eq!(table.current_page(), 1);
        assert_eq!(table.sort_field(), None);
        assert_eq!(table.sort_direction(), SortDirection::Asc);
        assert_eq!(table.total_items(), 12);
        assert_eq!(table.page_size(), 10);
        assert_eq!(table.view().len(), 10);
    }

    #[test]
    fn unpaginated_table_is_one_page() {
        let table = TableView::new(rows(25), TableConfig::default().page_size(0));
        assert_eq!(table.total_pages(), 1);
        assert_eq!(table.start_index(), 0);
        assert_eq!(table.end_index(), 25);
        assert_eq!(table.view().len(), 25);
        assert!(!table.has_next_page());
    }

    #[test]
    fn empty_paginated_table_has_zero_pages() {
        let mut table = TableView::new(Vec::<Value>::new(), TableConfig::default());
        assert_eq!(table.total_pages(), 0);
        assert_eq!(table.current_page(), 1);
        assert!(table.is_empty());
        assert!(table.view().is_empty());
        table.go_to_page(4);
        assert_eq!(table.current_page(), 1);
        assert!(!table.has_prev_page());
    }

    #[test]
    fn shrinking_source_clamps_page() {
        let mut table = TableView::new(rows(30), TableConfig::default().page_size(10));
        table.go_to_page(3);
        assert_eq!(table.current_page(), 3);
        table.set_source(rows(11));
        assert_eq!(table.total_pages(), 2);
        assert_eq!(table.current_page(), 2);
        assert_eq!(table.items_in_page(), 1);
    }

    #[test]
    fn growing_page_size_clamps_page() {
        let mut table = TableView::new(rows(30), TableConfig::default().page_size(5));
        table.go_to_page(6);
        table.set_page_size(10);
        assert_eq!(table.current_page(), 3);
        table.set_page_size(0);
        assert_eq!(table.current_page(), 1);
    }

    #[test]
    fn filter_applies_before_sort_and_page() {
        let mut table = TableView::new(rows(12), TableConfig::default().page_size(5))
            .with_filter(|row: &Value| row["id"].as_u64().is_some_and(|id| id % 2 == 0));
        assert_eq!(table.filtered_len(), 6);
        assert_eq!(table.total_pages(), 2);
        table.set_sort(Some("id"), SortDirection::Desc);
        let ids: Vec<_> = table.view().iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, [json!(12), json!(10), json!(8), json!(6), json!(4)]);
        table.clear_filter();
        assert_eq!(table.total_items(), 12);
    }

    #[test]
    fn record_filter_integrates() {
        let mut table = TableView::new(rows(12), TableConfig::default());
        table.set_record_filter(RecordFilter::text_search(["name"], "ROW 1"));
        // row 1, 10, 11, 12
        assert_eq!(table.total_items(), 4);
        table.set_record_filter(RecordFilter::All);
        assert_eq!(table.total_items(), 12);
    }

    #[test]
    fn source_is_never_reordered() {
        let data = vec![json!({"v": 3}), json!({"v": 1}), json!({"v": 2})];
        let mut table = TableView::new(data.clone(), TableConfig::default().sort_by("v", SortDirection::Asc));
        assert_eq!(table.source(), data.as_slice());
        table.handle_sort("v");
        assert_eq!(table.source(), data.as_slice());
        assert_eq!(table.filtered(), data.iter().collect::<Vec<_>>());
    }
}
