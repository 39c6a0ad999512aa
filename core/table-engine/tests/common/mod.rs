//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for table engine integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use table_engine::{
    Column, ColumnFilter, ColumnSet, DataSource, Entity, Fetched, Field, FieldDiscovery,
    FilterOption, Frame, FrameOptions, OptionLookup, OptionSource, QueryDescription, QueryValue,
    SourceError, TableResult,
};
use tokio::task::JoinHandle;

// ============================================================================
// FIXTURES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub id: u32,
    pub reference: String,
    pub title: String,
    pub owner: Option<String>,
    pub status: String,
}

impl Entity for Control {
    type Id = u32;

    fn id(&self) -> u32 {
        self.id
    }
}

pub fn control(id: u32) -> Control {
    Control {
        id,
        reference: format!("A.{}", id),
        title: format!("Control {}", id),
        owner: None,
        status: "open".to_string(),
    }
}

pub fn controls(count: u32) -> Vec<Control> {
    (1..=count).map(control).collect()
}

pub fn status_options() -> Vec<FilterOption> {
    vec![
        FilterOption::new("open", "Open"),
        FilterOption::new("implemented", "Implemented"),
        FilterOption::new("retired", "Retired"),
    ]
}

/// reference (required, pattern + existence), title (required, pattern),
/// owner (optional, existence), status (optional, values).
pub fn control_columns() -> ColumnSet<Control> {
    let reference = Column::new(
        Field::text("reference", "Reference", |c: &Control| Some(c.reference.clone()))
            .with_required(true),
    )
    .with_filter(ColumnFilter::builder("reference").with_pattern().with_existence());

    let title = Column::new(
        Field::text("title", "Title", |c: &Control| Some(c.title.clone())).with_required(true),
    )
    .with_filter(ColumnFilter::builder("title").with_pattern());

    let owner = Column::new(Field::text("owner", "Owner", |c: &Control| c.owner.clone()))
        .with_filter(ColumnFilter::builder("owner").with_existence());

    let status = Column::new(Field::text("status", "Status", |c: &Control| {
        Some(c.status.clone())
    }))
    .with_filter(
        ColumnFilter::builder("status")
            .with_values(OptionSource::Static(status_options()))
            .expect("static options are not empty"),
    );

    ColumnSet::new(vec![reference, title, owner, status]).expect("column names are unique")
}

/// `control_columns` with owner filtered by values resolved through `lookup`.
pub fn owner_lookup_columns(lookup: Arc<FakeLookup>) -> ColumnSet<Control> {
    let title = Column::new(
        Field::text("title", "Title", |c: &Control| Some(c.title.clone())).with_required(true),
    )
    .with_filter(ColumnFilter::builder("title").with_pattern());

    let owner = Column::new(Field::text("owner", "Owner", |c: &Control| c.owner.clone()))
        .with_filter(
            ColumnFilter::builder("owner")
                .with_values(OptionSource::Remote(lookup))
                .expect("remote options are valid"),
        );

    ColumnSet::new(vec![title, owner]).expect("column names are unique")
}

// ============================================================================
// FAKE COLLABORATORS
// ============================================================================

/// In-memory data source. Records every query and slices pages the way a
/// server would.
pub struct FakeSource {
    rows: Mutex<Vec<Control>>,
    queries: Mutex<Vec<QueryDescription>>,
    delay: Mutex<Duration>,
    failing: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSource {
    pub fn new(rows: Vec<Control>) -> Arc<Self> {
        Arc::new(FakeSource {
            rows: Mutex::new(rows),
            queries: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::ZERO),
            failing: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<QueryDescription> {
        self.queries.lock().unwrap().clone()
    }

    pub fn last_query(&self) -> Option<QueryDescription> {
        self.queries.lock().unwrap().last().cloned()
    }

    pub fn set_rows(&self, rows: Vec<Control>) {
        *self.rows.lock().unwrap() = rows;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource<Control> for FakeSource {
    async fn fetch(&self, query: &QueryDescription) -> Result<Fetched<Control>, SourceError> {
        self.queries.lock().unwrap().push(query.clone());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::new("backend unavailable"));
        }

        let rows = self.rows.lock().unwrap().clone();
        match (query.get_int("page"), query.get_int("page_size")) {
            (Some(page), Some(size)) => {
                let size = size as usize;
                let start = (page as usize - 1) * size;
                let items = rows.iter().skip(start).take(size).cloned().collect();
                Ok(Fetched::Page {
                    items,
                    total_count: rows.len(),
                })
            }
            _ => Ok(Fetched::List(rows)),
        }
    }
}

/// Field discovery returning a fixed list of names.
pub struct FakeDiscovery {
    fields: Mutex<Vec<String>>,
    queries: Mutex<Vec<QueryDescription>>,
}

impl FakeDiscovery {
    pub fn new(fields: &[&str]) -> Arc<Self> {
        Arc::new(FakeDiscovery {
            fields: Mutex::new(fields.iter().map(|f| f.to_string()).collect()),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn set_fields(&self, fields: &[&str]) {
        *self.fields.lock().unwrap() = fields.iter().map(|f| f.to_string()).collect();
    }

    pub fn queries(&self) -> Vec<QueryDescription> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl FieldDiscovery for FakeDiscovery {
    async fn present_fields(&self, query: &QueryDescription) -> Result<Vec<String>, SourceError> {
        self.queries.lock().unwrap().push(query.clone());
        Ok(self.fields.lock().unwrap().clone())
    }
}

/// Remote option lookup whose calls take the queued delays, in order.
/// `lookup` calls also consume the queued failures, in order.
pub struct FakeLookup {
    options: Vec<FilterOption>,
    delays: Mutex<VecDeque<Duration>>,
    failures: Mutex<VecDeque<bool>>,
    lookups: AtomicUsize,
}

impl FakeLookup {
    pub fn new(options: Vec<FilterOption>) -> Arc<Self> {
        Arc::new(FakeLookup {
            options,
            delays: Mutex::new(VecDeque::new()),
            failures: Mutex::new(VecDeque::new()),
            lookups: AtomicUsize::new(0),
        })
    }

    pub fn queue_delays(&self, delays: &[u64]) {
        let mut queue = self.delays.lock().unwrap();
        queue.extend(delays.iter().map(|ms| Duration::from_millis(*ms)));
    }

    /// `true` makes the matching `lookup` call fail after its delay.
    pub fn queue_failures(&self, failures: &[bool]) {
        self.failures.lock().unwrap().extend(failures.iter().copied());
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn next_delay(&self) -> Duration {
        self.delays.lock().unwrap().pop_front().unwrap_or(Duration::ZERO)
    }
}

#[async_trait]
impl OptionLookup for FakeLookup {
    async fn search(&self, text: &str, limit: usize) -> Result<Vec<FilterOption>, SourceError> {
        let delay = self.next_delay();
        tokio::time::sleep(delay).await;
        let text = text.to_lowercase();
        Ok(self
            .options
            .iter()
            .filter(|o| o.label.to_lowercase().contains(&text))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn lookup(&self, values: &[QueryValue]) -> Result<Vec<FilterOption>, SourceError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let delay = self.next_delay();
        let fails = self.failures.lock().unwrap().pop_front().unwrap_or(false);
        tokio::time::sleep(delay).await;
        if fails {
            return Err(SourceError::new("lookup timed out"));
        }
        Ok(self
            .options
            .iter()
            .filter(|o| values.contains(&o.value))
            .cloned()
            .collect())
    }
}

// ============================================================================
// HARNESS
// ============================================================================

/// A frame over `FakeSource` and `FakeDiscovery` with its pipeline running
/// on a spawned task.
pub struct TestHarness {
    pub frame: Frame<Control>,
    pub source: Arc<FakeSource>,
    pub discovery: Arc<FakeDiscovery>,
    handle: Option<JoinHandle<TableResult<()>>>,
}

impl TestHarness {
    /// Paginated frame (page size 25) over `rows`.
    pub fn new(rows: Vec<Control>) -> Self {
        Self::with_options(rows, FrameOptions::default())
    }

    pub fn unpaginated(rows: Vec<Control>) -> Self {
        Self::with_options(
            rows,
            FrameOptions {
                paginated: false,
                ..FrameOptions::default()
            },
        )
    }

    pub fn with_options(rows: Vec<Control>, options: FrameOptions) -> Self {
        Self::with_columns(rows, control_columns(), options)
    }

    pub fn with_columns(
        rows: Vec<Control>,
        columns: ColumnSet<Control>,
        options: FrameOptions,
    ) -> Self {
        let source = FakeSource::new(rows);
        let discovery = FakeDiscovery::new(&[]);
        let frame = Frame::with_discovery(
            columns,
            source.clone(),
            discovery.clone(),
            options,
        )
        .expect("valid frame options");

        let runner = frame.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        TestHarness {
            frame,
            source,
            discovery,
            handle: Some(handle),
        }
    }

    /// Let debounce timers and fetches finish (time is paused in tests, so
    /// this advances the clock instantly).
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    /// Wait for the pipeline task to end on its own.
    pub async fn join(&mut self) -> TableResult<()> {
        match self.handle.take() {
            Some(handle) => handle.await.expect("pipeline task panicked"),
            None => Ok(()),
        }
    }

    /// Run the pipeline again on a new task, after the previous run ended.
    pub fn restart(&mut self) {
        let runner = self.frame.clone();
        self.handle = Some(tokio::spawn(async move { runner.run().await }));
    }

    /// Close the frame and wait for the pipeline to drain.
    pub async fn shutdown(mut self) -> TableResult<()> {
        self.frame.close();
        self.join().await
    }
}
