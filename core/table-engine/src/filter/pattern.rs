//! FILENAME: core/table-engine/src/filter/pattern.rs
//! PURPOSE: Free-text pattern filter on one attribute.
//! CONTEXT: Writes the raw pattern under the attribute name. `*` is a
//! wildcard for the data source; `matches` applies the same rule locally.

use async_trait::async_trait;
use query::QueryDescription;

use crate::cell::Observable;
use crate::error::SourceError;
use crate::filter::Filter;

pub struct PatternFilter {
    name: String,
    pattern: Observable<String>,
    fragment: Observable<QueryDescription>,
    is_set: Observable<bool>,
}

impl PatternFilter {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let pattern = Observable::new(String::new());

        let key = name.clone();
        let fragment = pattern.map(move |p: &String| {
            if p.is_empty() {
                QueryDescription::new()
            } else {
                QueryDescription::single(key.clone(), p.as_str())
            }
        });
        let is_set = pattern.map(|p: &String| !p.is_empty());

        PatternFilter {
            name,
            pattern,
            fragment,
            is_set,
        }
    }

    pub fn set_pattern(&self, pattern: impl Into<String>) {
        self.pattern.set(pattern.into());
    }

    pub fn pattern(&self) -> String {
        self.pattern.get()
    }

    pub fn pattern_cell(&self) -> &Observable<String> {
        &self.pattern
    }

    /// Case-insensitive match of `text` against the current pattern.
    /// Without a `*` the pattern matches as a substring; with one it must
    /// match the whole text. An empty pattern matches everything.
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.with(|p| wildcard_match(p, text))
    }
}

#[async_trait]
impl Filter for PatternFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn fragment(&self) -> &Observable<QueryDescription> {
        &self.fragment
    }

    fn is_set(&self) -> &Observable<bool> {
        &self.is_set
    }

    fn clear(&self) {
        self.pattern.set_if_changed(String::new());
    }

    async fn restore(&self, query: &QueryDescription) -> Result<(), SourceError> {
        let pattern = query.get_text(&self.name).unwrap_or_default().to_string();
        self.pattern.set_if_changed(pattern);
        Ok(())
    }
}

pub(crate) fn wildcard_match(pattern: &str, text: &str) -> bool {
    if pattern.is_empty() {
        return true;
    }
    let pattern = pattern.to_lowercase();
    let text = text.to_lowercase();

    if !pattern.contains('*') {
        return text.contains(&pattern);
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let mut rest = text.as_str();

    // First part anchors at the start, last part at the end.
    let first = parts[0];
    if !rest.starts_with(first) {
        return false;
    }
    rest = &rest[first.len()..];

    let last = parts[parts.len() - 1];
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}
