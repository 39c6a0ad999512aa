//! FILENAME: core/query/src/paging.rs
//! PURPOSE: Page and sort state plus their query description encoding.

use serde::{Deserialize, Serialize};

use crate::description::{
    QueryDescription, PAGE_KEY, PAGE_SIZE_KEY, SORT_BY_KEY, SORT_ORDER_KEY,
};

/// Page sizes a table may use. Anything else is rejected on parse.
pub const PAGE_SIZE_OPTIONS: [usize; 3] = [25, 50, 100];

pub const DEFAULT_PAGE_SIZE: usize = 25;

pub fn is_valid_page_size(size: usize) -> bool {
    PAGE_SIZE_OPTIONS.contains(&size)
}

// ============================================================================
// PAGE STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState {
    pub page_size: usize,
    /// 0-based. The wire format is 1-based.
    pub page_index: usize,
}

impl Default for PageState {
    fn default() -> Self {
        PageState {
            page_size: DEFAULT_PAGE_SIZE,
            page_index: 0,
        }
    }
}

impl PageState {
    pub fn new(page_size: usize, page_index: usize) -> Self {
        PageState {
            page_size,
            page_index,
        }
    }

    pub fn first_page(self) -> Self {
        PageState {
            page_index: 0,
            ..self
        }
    }

    pub fn to_query(&self) -> QueryDescription {
        QueryDescription::new()
            .with(PAGE_KEY, self.page_index.saturating_add(1))
            .with(PAGE_SIZE_KEY, self.page_size)
    }

    /// Parse the page keys of `query`. A missing or invalid page number or page
    /// size keeps the corresponding part of `fallback`.
    pub fn from_query(query: &QueryDescription, fallback: PageState) -> PageState {
        let page_size = query
            .get_int(PAGE_SIZE_KEY)
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| is_valid_page_size(*n))
            .unwrap_or(fallback.page_size);

        let page_index = query
            .get_int(PAGE_KEY)
            .filter(|n| *n >= 1)
            .and_then(|n| usize::try_from(n - 1).ok())
            .unwrap_or(fallback.page_index);

        PageState {
            page_size,
            page_index,
        }
    }
}

// ============================================================================
// SORT STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
    /// No explicit sort; the data source applies its default ordering.
    #[default]
    None,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
            SortDirection::None => "",
        }
    }

    pub fn parse(s: &str) -> SortDirection {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            _ => SortDirection::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortState {
    /// Name of the sorted column.
    pub active: Option<String>,
    pub direction: SortDirection,
}

impl SortState {
    pub fn new(active: impl Into<String>, direction: SortDirection) -> Self {
        SortState {
            active: Some(active.into()),
            direction,
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.active.is_some() && self.direction != SortDirection::None
    }

    pub fn to_query(&self) -> QueryDescription {
        match (&self.active, self.direction) {
            (Some(active), SortDirection::Asc | SortDirection::Desc) => QueryDescription::new()
                .with(SORT_BY_KEY, active.as_str())
                .with(SORT_ORDER_KEY, self.direction.as_str()),
            _ => QueryDescription::new(),
        }
    }

    pub fn from_query(query: &QueryDescription) -> SortState {
        let active = query.get_text(SORT_BY_KEY).filter(|s| !s.is_empty());
        let direction = query
            .get_text(SORT_ORDER_KEY)
            .map(SortDirection::parse)
            .unwrap_or_default();
        match active {
            Some(active) if direction != SortDirection::None => SortState::new(active, direction),
            _ => SortState::default(),
        }
    }
}
