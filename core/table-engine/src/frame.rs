//! FILENAME: core/table-engine/src/frame.rs
//! PURPOSE: The frame: one table's columns, search, sort and paging folded into
//! a single debounced query stream, plus the cached page of rows it produces.
//! CONTEXT: State changes travel up through cells into `query`, which pushes
//! every new value into a trigger channel. `run()` drains that channel:
//!
//!   triggers -> settle (debounce + distinct) -> data pipe    -> rows, total_count
//!                                            -> columns pipe -> reported fields
//!
//! Each pipe is an exhaust-latest stage, so at most one fetch and one field
//! discovery are in flight at any time. Local edits (add/update/remove) write
//! the row cache directly and do not go through the pipes.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use query::{
    is_valid_page_size, QueryDescription, QueryValue, DEFAULT_PAGE_SIZE, HIDDEN_COLUMNS_KEY,
    PAGE_KEY, PAGE_SIZE_KEY, SEARCH_KEY, SORT_BY_KEY, SORT_ORDER_KEY,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::cell::{lock, Observable};
use crate::column::ColumnSet;
use crate::error::{ConfigError, SourceError, TableError, TableResult};
use crate::exhaust::exhaust_latest;
use crate::paging::{Paginator, Search, Sorter};
use crate::source::{DataSource, Entity, Fetched, FieldDiscovery};
use crate::{log_debug, log_enter, log_error, log_exit, log_info};

// ============================================================================
// OPTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameOptions {
    /// Quiet period before a changed query is fetched.
    pub debounce_ms: u64,
    pub paginated: bool,
    pub page_size: usize,
    /// Query key of the free-text search box.
    pub search_key: String,
}

impl Default for FrameOptions {
    fn default() -> Self {
        FrameOptions {
            debounce_ms: 10,
            paginated: true,
            page_size: DEFAULT_PAGE_SIZE,
            search_key: SEARCH_KEY.to_string(),
        }
    }
}

impl FrameOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_page_size(self.page_size) {
            return Err(ConfigError::InvalidPageSize(self.page_size));
        }
        Ok(())
    }
}

// ============================================================================
// FRAME
// ============================================================================

enum Trigger {
    Query(QueryDescription),
    /// Re-emit the current query even if it did not change.
    Reload,
    /// The last running restore finished; dispatch may go ahead.
    Resume,
    Close,
}

type TriggerSlot = Mutex<Option<mpsc::UnboundedReceiver<Trigger>>>;

/// The trigger receiver, taken out of its slot for one `run()`. Dropping it
/// puts the receiver back, together with any triggers still queued.
struct CheckedOut<'a> {
    slot: &'a TriggerSlot,
    receiver: Option<mpsc::UnboundedReceiver<Trigger>>,
}

impl<'a> CheckedOut<'a> {
    fn take(slot: &'a TriggerSlot) -> Self {
        let receiver = lock(slot).take();
        CheckedOut { slot, receiver }
    }
}

impl Drop for CheckedOut<'_> {
    fn drop(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            *lock(self.slot) = Some(receiver);
        }
    }
}

/// Keys the field discovery call never sees.
const DISCOVERY_EXCLUDED_KEYS: [&str; 5] = [
    PAGE_KEY,
    PAGE_SIZE_KEY,
    SORT_BY_KEY,
    SORT_ORDER_KEY,
    HIDDEN_COLUMNS_KEY,
];

struct FrameInner<T: Entity> {
    options: FrameOptions,
    columns: ColumnSet<T>,
    search: Search,
    sorter: Sorter,
    paginator: Paginator,
    source: Arc<dyn DataSource<T>>,
    discovery: Option<Arc<dyn FieldDiscovery>>,

    /// `{hidden_columns: [..]}`, or empty. Held here because `query` only
    /// keeps weak references to its sources.
    #[allow(dead_code)]
    hidden_fragment: Observable<QueryDescription>,
    query: Observable<QueryDescription>,
    rows: Observable<Vec<T>>,
    total_count: Observable<usize>,
    /// Field names reported by discovery; `None` until the first answer.
    reported_fields: Observable<Option<Vec<String>>>,
    visible_columns: Observable<Vec<String>>,
    loading_columns: Observable<bool>,
    loading_data: Observable<bool>,

    /// Generation of the newest started fetch.
    generation: AtomicU64,
    reload_requests: AtomicU64,
    /// Number of `restore` calls still applying their steps. Nothing is
    /// dispatched while it is above zero.
    restoring: AtomicUsize,
    triggers: mpsc::UnboundedSender<Trigger>,
    receiver: TriggerSlot,
}

/// Held by `restore` while it runs; the last one out wakes the settle loop.
struct RestoreGate<'a, T: Entity> {
    inner: &'a FrameInner<T>,
}

impl<'a, T: Entity> RestoreGate<'a, T> {
    fn enter(inner: &'a FrameInner<T>) -> Self {
        inner.restoring.fetch_add(1, Ordering::SeqCst);
        RestoreGate { inner }
    }
}

impl<T: Entity> Drop for RestoreGate<'_, T> {
    fn drop(&mut self) {
        if self.inner.restoring.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.inner.triggers.send(Trigger::Resume);
        }
    }
}

/// A table's reactive state. Clones share the same frame.
pub struct Frame<T: Entity> {
    inner: Arc<FrameInner<T>>,
}

impl<T: Entity> Clone for Frame<T> {
    fn clone(&self) -> Self {
        Frame {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Entity> Frame<T> {
    pub fn new(
        columns: ColumnSet<T>,
        source: Arc<dyn DataSource<T>>,
        options: FrameOptions,
    ) -> TableResult<Self> {
        Frame::build(columns, source, None, options)
    }

    /// Frame whose optional columns are also shown when `discovery` reports
    /// their field as present in the data set.
    pub fn with_discovery(
        columns: ColumnSet<T>,
        source: Arc<dyn DataSource<T>>,
        discovery: Arc<dyn FieldDiscovery>,
        options: FrameOptions,
    ) -> TableResult<Self> {
        Frame::build(columns, source, Some(discovery), options)
    }

    fn build(
        columns: ColumnSet<T>,
        source: Arc<dyn DataSource<T>>,
        discovery: Option<Arc<dyn FieldDiscovery>>,
        options: FrameOptions,
    ) -> TableResult<Self> {
        options.validate()?;
        log_enter!(
            "FRAME",
            "build",
            "columns={:?} paginated={} page_size={}",
            columns.names(),
            options.paginated,
            options.page_size
        );

        let search = Search::new(options.search_key.clone());
        let sorter = Sorter::new();
        let paginator = Paginator::new(options.paginated, options.page_size)?;

        // Page resets go first, so the combined query below already sees
        // page 1 when it recomputes for the same change.
        for fragment in [
            search.fragment(),
            sorter.fragment(),
            columns.filter_fragment(),
        ] {
            let page = paginator.state().clone();
            fragment.subscribe_changes(move |_| {
                page.update(|p| p.page_index = 0);
            });
        }

        let hidden = columns.hidden_names().map(|names: &Vec<String>| {
            if names.is_empty() {
                QueryDescription::new()
            } else {
                let names: Vec<QueryValue> = names.iter().map(|n| n.as_str().into()).collect();
                QueryDescription::single(HIDDEN_COLUMNS_KEY, QueryValue::List(names))
            }
        });

        // Later fragments win, so the reserved keys override any filter key.
        let query = Observable::combine(
            &[
                columns.filter_fragment().clone(),
                hidden.clone(),
                paginator.fragment().clone(),
                sorter.fragment().clone(),
                search.fragment().clone(),
            ],
            |fragments: &[QueryDescription]| QueryDescription::merged(fragments),
        );

        let (triggers, receiver) = mpsc::unbounded_channel();
        let query_tx = triggers.clone();
        query.subscribe(move |q| {
            let _ = query_tx.send(Trigger::Query(q.clone()));
        });

        let inner = Arc::new(FrameInner {
            options,
            columns,
            search,
            sorter,
            paginator,
            source,
            discovery,
            hidden_fragment: hidden,
            query,
            rows: Observable::new(Vec::new()),
            total_count: Observable::new(0),
            reported_fields: Observable::new(None),
            visible_columns: Observable::new(Vec::new()),
            loading_columns: Observable::new(false),
            loading_data: Observable::new(false),
            generation: AtomicU64::new(0),
            reload_requests: AtomicU64::new(0),
            restoring: AtomicUsize::new(0),
            triggers,
            receiver: Mutex::new(Some(receiver)),
        });

        let weak = Arc::downgrade(&inner);
        inner.rows.subscribe_changes(refresh_on_change(&weak));
        inner.reported_fields.subscribe_changes(refresh_on_change(&weak));
        inner.columns.hidden_names().subscribe_changes(refresh_on_change(&weak));
        inner.refresh_visible_columns();

        log_exit!("FRAME", "build");
        Ok(Frame { inner })
    }

    // ------------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------------

    /// Drive the fetch pipeline until `close()` is called or a collaborator
    /// fails. Only one `run()` may be active per frame. Once it has returned,
    /// the frame may be run again; triggers sent in between (a `reload()`
    /// after a failure, say) are picked up by the next run.
    pub async fn run(&self) -> TableResult<()> {
        let mut checked_out = CheckedOut::take(&self.inner.receiver);
        let receiver = checked_out
            .receiver
            .as_mut()
            .ok_or(TableError::AlreadyRunning)?;
        let inner: &FrameInner<T> = &self.inner;
        log_info!("PIPE", "pipeline started");

        let (data_tx, data_rx) = mpsc::unbounded_channel();
        let (columns_tx, columns_rx) = if inner.discovery.is_some() {
            let (tx, rx) = mpsc::unbounded_channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let settle = inner.settle(receiver, data_tx, columns_tx);

        let data = exhaust_latest(
            data_rx,
            move |query| inner.fetch_rows(query),
            move |(generation, fetched): (u64, Fetched<T>)| inner.apply_rows(generation, fetched),
        );

        let columns = async move {
            match columns_rx {
                Some(rx) => {
                    exhaust_latest(
                        rx,
                        move |query| inner.discover_fields(query),
                        move |fields| inner.apply_fields(fields),
                    )
                    .await
                }
                None => Ok(()),
            }
        };

        let result = tokio::try_join!(settle, data, columns);
        inner.loading_data.set_if_changed(false);
        inner.loading_columns.set_if_changed(false);

        match result {
            Ok(_) => {
                log_info!("PIPE", "pipeline closed");
                Ok(())
            }
            Err(e) => {
                log_error!("PIPE", "pipeline terminated: {}", e);
                Err(TableError::Source(e))
            }
        }
    }

    /// Stop the pipeline. Work already dispatched finishes; a change still
    /// waiting out the debounce is dropped.
    pub fn close(&self) {
        let _ = self.inner.triggers.send(Trigger::Close);
    }

    /// Fetch the current query again even if it did not change.
    pub fn reload(&self) {
        self.inner.reload();
    }

    /// Number of `reload()` calls so far, explicit or caused by `remove_item`.
    pub fn reload_requests(&self) -> u64 {
        self.inner.reload_requests.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------------
    // Local edits
    // ------------------------------------------------------------------------

    /// Append `item` to the cached page. Fails (returns false) when the frame
    /// is paginated and the page is already full; the caller should reload.
    pub fn add_item(&self, item: T) -> bool {
        let inner = &self.inner;
        if inner.page_is_full() {
            log_debug!("FRAME", "add_item refused, page is full");
            return false;
        }
        inner.rows.update(|rows| rows.push(item));
        inner.total_count.update(|n| *n += 1);
        true
    }

    /// Replace the cached row with the same identity. Returns whether one was found.
    pub fn update_item(&self, item: T) -> bool {
        let id = item.id();
        let mut found = false;
        self.inner.rows.update(|rows| {
            if let Some(slot) = rows.iter_mut().find(|r| r.id() == id) {
                *slot = item;
                found = true;
            }
        });
        found
    }

    pub fn add_or_update_item(&self, item: T) -> bool {
        let id = item.id();
        let present = self.inner.rows.with(|rows| rows.iter().any(|r| r.id() == id));
        if present {
            self.update_item(item)
        } else {
            self.add_item(item)
        }
    }

    /// Drop the cached row with the same identity as `item`. Removing from a
    /// full page reloads, so the row after the page boundary moves up.
    pub fn remove_item(&self, item: &T) -> bool {
        let inner = &self.inner;
        let was_full = inner.page_is_full();
        let id = item.id();

        let mut removed = false;
        inner.rows.update(|rows| {
            if let Some(pos) = rows.iter().position(|r| r.id() == id) {
                rows.remove(pos);
                removed = true;
            }
        });
        if !removed {
            return false;
        }

        inner.total_count.update(|n| *n = n.saturating_sub(1));
        if was_full {
            log_debug!("FRAME", "removed {:?} from a full page, reloading", id);
            inner.reload();
        }
        true
    }

    pub fn clear_all_filters(&self) {
        self.inner.columns.clear_all_filters();
    }

    /// Bring search, sort, filters and page back from a serialized query.
    /// The page goes last so the restored filters do not reset it. No query
    /// is dispatched until every step, lookups included, has been applied.
    pub async fn restore(&self, query: &QueryDescription) -> TableResult<()> {
        let inner = &self.inner;
        log_enter!("FRAME", "restore", "{:?}", query);
        let _gate = RestoreGate::enter(inner);
        inner.search.restore(query);
        inner.sorter.restore(query);
        inner.columns.restore_filters(query).await?;
        inner.paginator.restore(query);
        log_exit!("FRAME", "restore");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn options(&self) -> &FrameOptions {
        &self.inner.options
    }

    pub fn columns(&self) -> &ColumnSet<T> {
        &self.inner.columns
    }

    pub fn search(&self) -> &Search {
        &self.inner.search
    }

    pub fn sorter(&self) -> &Sorter {
        &self.inner.sorter
    }

    pub fn paginator(&self) -> &Paginator {
        &self.inner.paginator
    }

    /// The combined query description, before debounce.
    pub fn query(&self) -> &Observable<QueryDescription> {
        &self.inner.query
    }

    pub fn rows(&self) -> &Observable<Vec<T>> {
        &self.inner.rows
    }

    pub fn total_count(&self) -> &Observable<usize> {
        &self.inner.total_count
    }

    pub fn visible_columns(&self) -> &Observable<Vec<String>> {
        &self.inner.visible_columns
    }

    pub fn any_filter_set(&self) -> &Observable<bool> {
        self.inner.columns.any_filter_set()
    }

    pub fn loading_columns(&self) -> &Observable<bool> {
        &self.inner.loading_columns
    }

    pub fn loading_data(&self) -> &Observable<bool> {
        &self.inner.loading_data
    }
}

fn refresh_on_change<T: Entity, V: 'static>(
    weak: &Weak<FrameInner<T>>,
) -> impl Fn(&V) + Send + Sync + 'static {
    let weak = weak.clone();
    move |_| {
        if let Some(inner) = weak.upgrade() {
            inner.refresh_visible_columns();
        }
    }
}

impl<T: Entity> FrameInner<T> {
    fn page_is_full(&self) -> bool {
        self.paginator.is_enabled()
            && self.rows.with(Vec::len) >= self.paginator.page_size()
    }

    fn is_restoring(&self) -> bool {
        self.restoring.load(Ordering::SeqCst) > 0
    }

    fn reload(&self) {
        let n = self.reload_requests.fetch_add(1, Ordering::SeqCst) + 1;
        log_debug!("FRAME", "reload requested (#{})", n);
        let _ = self.triggers.send(Trigger::Reload);
    }

    fn refresh_visible_columns(&self) {
        let visible = self.rows.with(|rows| {
            self.reported_fields
                .with(|reported| self.columns.visible_names(rows, reported.as_deref()))
        });
        self.visible_columns.set_if_changed(visible);
    }

    /// Debounce the trigger stream and forward every settled query that
    /// differs from the last one forwarded. Reloads skip the comparison.
    async fn settle(
        &self,
        triggers: &mut mpsc::UnboundedReceiver<Trigger>,
        data_tx: mpsc::UnboundedSender<Result<QueryDescription, SourceError>>,
        columns_tx: Option<mpsc::UnboundedSender<Result<QueryDescription, SourceError>>>,
    ) -> Result<(), SourceError> {
        let debounce = self.options.debounce();
        let mut last: Option<QueryDescription> = None;
        let mut pending: Option<(QueryDescription, bool)> = None;

        let timer = tokio::time::sleep(debounce);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                trigger = triggers.recv() => {
                    let (query, forced) = match trigger {
                        Some(Trigger::Query(query)) => {
                            let forced = pending.as_ref().map_or(false, |(_, f)| *f);
                            (query, forced)
                        }
                        Some(Trigger::Reload) => (self.query.get(), true),
                        Some(Trigger::Resume) => {
                            if pending.is_some() {
                                timer.as_mut().reset(Instant::now() + debounce);
                            }
                            continue;
                        }
                        Some(Trigger::Close) | None => break,
                    };
                    pending = Some((query, forced));
                    timer.as_mut().reset(Instant::now() + debounce);
                }

                () = &mut timer, if pending.is_some() && !self.is_restoring() => {
                    if self.is_restoring() {
                        log_debug!("PIPE", "restore in progress, dispatch held");
                        continue;
                    }
                    let Some((query, forced)) = pending.take() else {
                        continue;
                    };
                    if !forced && last.as_ref() == Some(&query) {
                        log_debug!("PIPE", "query unchanged, skipped");
                        continue;
                    }
                    log_debug!("PIPE", "dispatch {:?} (forced={})", query, forced);
                    if let Some(tx) = &columns_tx {
                        let _ = tx.send(Ok(query.without_keys(&DISCOVERY_EXCLUDED_KEYS)));
                    }
                    let _ = data_tx.send(Ok(query.clone()));
                    last = Some(query);
                }
            }
        }

        if pending.is_some() {
            log_debug!("PIPE", "closing with an undispatched query");
        }
        Ok(())
    }

    async fn fetch_rows(
        &self,
        query: QueryDescription,
    ) -> Result<(u64, Fetched<T>), SourceError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.loading_data.set_if_changed(true);
        log_debug!("PIPE", "fetch #{} {:?}", generation, query);

        match self.source.fetch(&query).await {
            Ok(fetched) => Ok((generation, fetched)),
            Err(e) => {
                self.loading_data.set_if_changed(false);
                log_error!("PIPE", "fetch #{} failed: {}", generation, e);
                Err(e)
            }
        }
    }

    fn apply_rows(&self, generation: u64, fetched: Fetched<T>) {
        // Fetches never overlap, so a result always belongs to the newest one.
        debug_assert_eq!(generation, self.generation.load(Ordering::SeqCst));
        let (items, total) = fetched.into_parts();
        log_debug!("PIPE", "fetch #{} -> {} rows of {}", generation, items.len(), total);
        self.rows.set(items);
        self.total_count.set_if_changed(total);
        self.loading_data.set_if_changed(false);
    }

    async fn discover_fields(&self, query: QueryDescription) -> Result<Vec<String>, SourceError> {
        let Some(discovery) = &self.discovery else {
            return Ok(Vec::new());
        };
        self.loading_columns.set_if_changed(true);
        match discovery.present_fields(&query).await {
            Ok(fields) => Ok(fields),
            Err(e) => {
                self.loading_columns.set_if_changed(false);
                log_error!("COLUMNS", "field discovery failed: {}", e);
                Err(e)
            }
        }
    }

    fn apply_fields(&self, fields: Vec<String>) {
        log_debug!("COLUMNS", "present fields {:?}", fields);
        self.reported_fields.set_if_changed(Some(fields));
        self.loading_columns.set_if_changed(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults_and_json() {
        let options = FrameOptions::from_json(r#"{"page_size": 50}"#).unwrap();
        assert_eq!(options.page_size, 50);
        assert_eq!(options.debounce_ms, 10);
        assert!(options.paginated);
        assert_eq!(options.search_key, "search");
        assert_eq!(options.debounce(), Duration::from_millis(10));
    }

    #[test]
    fn test_options_reject_page_size() {
        let options = FrameOptions {
            page_size: 40,
            ..FrameOptions::default()
        };
        assert_eq!(options.validate(), Err(ConfigError::InvalidPageSize(40)));
    }
}
