#![forbid(unsafe_code)]

//! Declarative record filters for table views.
//!
//! The demands page combines a free-text search over a few columns with
//! status and unit dropdowns; an empty search term or an empty dropdown
//! value means "no constraint".

use pca_core::record::Record;
use pca_core::value::display_text;
use serde_json::Value;

/// A predicate over records built from simple parts.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordFilter {
    /// Matches everything.
    All,
    /// Case-insensitive substring match of `term` against any of `fields`.
    TextSearch { fields: Vec<String>, term: String },
    /// `field` equals `value` after rendering both as text.
    Equals { field: String, value: Value },
    /// Every inner filter matches.
    AllOf(Vec<RecordFilter>),
}

impl RecordFilter {
    /// Search `term` in `fields`. A blank term matches every record.
    pub fn text_search<I, S>(fields: I, term: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let term = term.into().trim().to_lowercase();
        if term.is_empty() {
            return Self::All;
        }
        Self::TextSearch {
            fields: fields.into_iter().map(Into::into).collect(),
            term,
        }
    }

    /// Exact match on one field. Null or an empty string matches every
    /// record.
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        if value.is_null() || value.as_str().is_some_and(str::is_empty) {
            return Self::All;
        }
        Self::Equals {
            field: field.into(),
            value,
        }
    }

    pub fn all_of(filters: impl IntoIterator<Item = RecordFilter>) -> Self {
        let filters: Vec<_> = filters
            .into_iter()
            .filter(|f| !matches!(f, Self::All))
            .collect();
        if filters.is_empty() {
            Self::All
        } else {
            Self::AllOf(filters)
        }
    }

    /// `true` when this filter constrains nothing.
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    #[must_use]
    pub fn matches<R: Record + ?Sized>(&self, record: &R) -> bool {
        match self {
            Self::All => true,
            Self::TextSearch { fields, term } => fields
                .iter()
                .any(|f| display_text(&record.field(f)).to_lowercase().contains(term)),
            Self::Equals { field, value } => {
                display_text(&record.field(field)) == display_text(value)
            }
            Self::AllOf(filters) => filters.iter().all(|f| f.matches(record)),
        }
    }
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self::All
    }
}
