//! FILENAME: core/table-engine/src/paging.rs
//! PURPOSE: Paginator, sorter and free-text search state.
//! CONTEXT: Each of these holds one small piece of frame state in a cell and
//! publishes it as a query description fragment. The frame resets the
//! paginator to the first page whenever the sort or search fragment changes.

use query::{is_valid_page_size, PageState, QueryDescription, SortDirection, SortState};

use crate::cell::Observable;
use crate::error::ConfigError;

// ============================================================================
// PAGINATOR
// ============================================================================

pub struct Paginator {
    enabled: bool,
    state: Observable<PageState>,
    fragment: Observable<QueryDescription>,
}

impl Paginator {
    /// A disabled paginator keeps its state but never emits a fragment.
    pub fn new(enabled: bool, page_size: usize) -> Result<Self, ConfigError> {
        if !is_valid_page_size(page_size) {
            return Err(ConfigError::InvalidPageSize(page_size));
        }
        let state = Observable::new(PageState::new(page_size, 0));
        let fragment = state.map(move |s: &PageState| {
            if enabled {
                s.to_query()
            } else {
                QueryDescription::new()
            }
        });
        Ok(Paginator {
            enabled,
            state,
            fragment,
        })
    }

    /// Move to `page`. A page size outside the allowed options keeps the
    /// current size.
    pub fn set_page(&self, page: PageState) {
        self.state.update(|current| {
            if is_valid_page_size(page.page_size) {
                current.page_size = page.page_size;
            }
            current.page_index = page.page_index;
        });
    }

    pub fn set_page_index(&self, page_index: usize) {
        self.state.update(|current| current.page_index = page_index);
    }

    pub fn to_first_page(&self) {
        self.state.update(|current| current.page_index = 0);
    }

    pub fn state(&self) -> &Observable<PageState> {
        &self.state
    }

    pub fn page_size(&self) -> usize {
        self.state.with(|s| s.page_size)
    }

    pub fn page_index(&self) -> usize {
        self.state.with(|s| s.page_index)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn fragment(&self) -> &Observable<QueryDescription> {
        &self.fragment
    }

    /// Take page size and index from `query`; whatever is missing or
    /// invalid there keeps its current value.
    pub fn restore(&self, query: &QueryDescription) {
        let next = PageState::from_query(query, self.state.get());
        self.state.set_if_changed(next);
    }
}

// ============================================================================
// SORTER
// ============================================================================

pub struct Sorter {
    state: Observable<SortState>,
    fragment: Observable<QueryDescription>,
}

impl Default for Sorter {
    fn default() -> Self {
        Sorter::new()
    }
}

impl Sorter {
    pub fn new() -> Self {
        let state: Observable<SortState> = Observable::default();
        let fragment = state.map(SortState::to_query);
        Sorter { state, fragment }
    }

    pub fn set_sort(&self, active: impl Into<String>, direction: SortDirection) {
        self.set_state(SortState::new(active, direction));
    }

    pub fn set_state(&self, state: SortState) {
        self.state.set_if_changed(state);
    }

    pub fn clear(&self) {
        self.state.set_if_changed(SortState::default());
    }

    pub fn state(&self) -> &Observable<SortState> {
        &self.state
    }

    pub fn fragment(&self) -> &Observable<QueryDescription> {
        &self.fragment
    }

    pub fn restore(&self, query: &QueryDescription) {
        self.state.set_if_changed(SortState::from_query(query));
    }
}

// ============================================================================
// SEARCH
// ============================================================================

/// Free-text search box. The trimmed text goes under a single key, and only
/// when it is non-empty.
pub struct Search {
    key: String,
    text: Observable<String>,
    fragment: Observable<QueryDescription>,
}

impl Search {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let text = Observable::new(String::new());
        let fragment_key = key.clone();
        let fragment = text.map(move |t: &String| {
            let trimmed = t.trim();
            if trimmed.is_empty() {
                QueryDescription::new()
            } else {
                QueryDescription::single(fragment_key.clone(), trimmed)
            }
        });
        Search {
            key,
            text,
            fragment,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.text.set_if_changed(text.into());
    }

    pub fn text(&self) -> String {
        self.text.get()
    }

    pub fn clear(&self) {
        self.set_text(String::new());
    }

    pub fn fragment(&self) -> &Observable<QueryDescription> {
        &self.fragment
    }

    pub fn restore(&self, query: &QueryDescription) {
        let text = query.get_text(&self.key).unwrap_or_default().to_string();
        self.text.set_if_changed(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query::{PAGE_KEY, PAGE_SIZE_KEY};

    #[test]
    fn test_invalid_page_size_is_a_config_error() {
        assert_eq!(
            Paginator::new(true, 30).err(),
            Some(ConfigError::InvalidPageSize(30))
        );
    }

    #[test]
    fn test_set_page_keeps_size_when_invalid() {
        let paginator = Paginator::new(true, 25).unwrap();
        paginator.set_page(PageState::new(50, 2));
        assert_eq!(paginator.state().get(), PageState::new(50, 2));

        paginator.set_page(PageState::new(7, 3));
        assert_eq!(paginator.state().get(), PageState::new(50, 3));

        paginator.to_first_page();
        assert_eq!(paginator.state().get(), PageState::new(50, 0));
    }

    #[test]
    fn test_fragment_is_one_based() {
        let paginator = Paginator::new(true, 25).unwrap();
        paginator.set_page_index(4);
        let fragment = paginator.fragment().get();
        assert_eq!(fragment.get_int(PAGE_KEY), Some(5));
        assert_eq!(fragment.get_int(PAGE_SIZE_KEY), Some(25));
    }

    #[test]
    fn test_disabled_paginator_emits_nothing() {
        let paginator = Paginator::new(false, 25).unwrap();
        paginator.set_page_index(2);
        assert!(paginator.fragment().get().is_empty());
        assert!(!paginator.is_enabled());
    }

    #[test]
    fn test_restore_rejects_bad_values() {
        let paginator = Paginator::new(true, 50).unwrap();
        paginator.set_page_index(3);
        paginator.restore(
            &QueryDescription::new()
                .with(PAGE_KEY, -2i64)
                .with(PAGE_SIZE_KEY, 10usize),
        );
        assert_eq!(paginator.state().get(), PageState::new(50, 3));

        paginator.restore(&QueryDescription::new().with(PAGE_KEY, 2usize));
        assert_eq!(paginator.state().get(), PageState::new(50, 1));
    }

    #[test]
    fn test_unsorted_has_no_fragment() {
        let sorter = Sorter::new();
        assert!(sorter.fragment().get().is_empty());

        sorter.set_sort("title", SortDirection::Desc);
        assert_eq!(
            sorter.fragment().get(),
            QueryDescription::new()
                .with("sort_by", "title")
                .with("sort_order", "desc")
        );

        sorter.set_sort("title", SortDirection::None);
        assert!(sorter.fragment().get().is_empty());
    }

    #[test]
    fn test_search_trims_and_omits_blank() {
        let search = Search::new("search");
        search.set_text("   ");
        assert!(search.fragment().get().is_empty());

        search.set_text("  firewall ");
        assert_eq!(
            search.fragment().get(),
            QueryDescription::single("search", "firewall")
        );

        search.restore(&QueryDescription::new());
        assert_eq!(search.text(), "");
    }
}
