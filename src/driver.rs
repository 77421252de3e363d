use slog::{debug, error, info, o};
use std::fmt;
use std::io::Write;
use std::mem;
use std::time::Instant;

use crate::backend::{Backend, Changes, Selector};
use crate::config::{Config, Connector};
use crate::error::{Error, Result};
use crate::record::{Record, RecordSource};
use crate::report::{BenchmarkResult, Reporter};

/// Load the input file, then run every phase against the configured backend.
///
/// An unreadable input fails before any connection is made.
pub async fn benchmark<W: Write>(
    log: slog::Logger,
    config: &Config,
    out: W,
) -> Result<Vec<BenchmarkResult>> {
    let source = RecordSource::with_delimiters(&config.input, config.delimiters);
    let records = source.load()?;
    info!(log, "Loaded records";
        "count" => records.len(),
        "path" => config.input.display().to_string());

    let log = log.new(o!("backend" => config.backend.name()));
    Driver::new(log, config.backend.clone(), out).run(records).await
}

/// One step of the benchmark sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Remove existing data.
    Clear,

    /// Write every input record.
    Insert,

    /// Overwrite every stored record.
    Update,

    /// Read every stored record.
    Retrieve,

    /// Remove every stored record.
    Delete,
}

impl Phase {
    /// Every phase, in the order a run executes them.
    pub const ALL: [Phase; 5] = [
        Phase::Clear,
        Phase::Insert,
        Phase::Update,
        Phase::Retrieve,
        Phase::Delete,
    ];

    /// The phase's name, as printed in reports.
    pub fn name(self) -> &'static str {
        match self {
            Phase::Clear => "Clear",
            Phase::Insert => "Insert",
            Phase::Update => "Update",
            Phase::Retrieve => "Retrieve",
            Phase::Delete => "Delete",
        }
    }

    /// The past tense used for row counts. Clearing reports no count.
    pub fn verb(self) -> Option<&'static str> {
        match self {
            Phase::Clear => None,
            Phase::Insert => Some("Inserted"),
            Phase::Update => Some("Updated"),
            Phase::Retrieve => Some("Retrieved"),
            Phase::Delete => Some("Deleted"),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The lifecycle of a [`Driver`].
///
/// [`Driver`]: struct.Driver.html
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// No connection has been attempted.
    Disconnected,

    /// A backend handle is open.
    Connected,

    /// The target store has been cleared.
    Initialized,

    /// The CRUD phases have started.
    Running,

    /// The handle has been released (or was never acquired). Terminal.
    Closed,
}

/// Runs the benchmark sequence against one backend.
///
/// The driver owns the backend handle for the whole run. [`run`] always releases it, whether or not
/// the phases succeed; the individual steps are public so partial runs can be driven (and tested)
/// one transition at a time.
///
/// [`run`]: struct.Driver.html#method.run
pub struct Driver<C, W> {
    log: slog::Logger,
    connector: C,
    reporter: Reporter<W>,
    state: State,
    backend: Option<Box<dyn Backend>>,
    results: Vec<BenchmarkResult>,
}

impl<C: Connector, W: Write> Driver<C, W> {
    /// A disconnected driver that reports to `out`.
    pub fn new(log: slog::Logger, connector: C, out: W) -> Self {
        Driver {
            log,
            connector,
            reporter: Reporter::new(out),
            state: State::Disconnected,
            backend: None,
            results: Vec::new(),
        }
    }

    /// The current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The results of the phases that have completed.
    pub fn results(&self) -> &[BenchmarkResult] {
        &self.results
    }

    /// Open the backend handle.
    ///
    /// A failed connection closes the driver.
    pub async fn connect(&mut self) -> Result<()> {
        self.require(State::Disconnected, "connect")?;
        match self.connector.connect(&self.log).await {
            Ok(backend) => {
                info!(self.log, "Connected"; "backend" => backend.name());
                self.backend = Some(backend);
                self.state = State::Connected;
                Ok(())
            }
            Err(err) => {
                error!(self.log, "Connection failed: {}", err);
                self.state = State::Closed;
                Err(err)
            }
        }
    }

    /// Clear the target store.
    pub async fn initialize(&mut self) -> Result<()> {
        self.require(State::Connected, "initialize")?;
        self.run_phase(Phase::Clear, &mut Vec::new()).await?;
        info!(self.log, "Backend initialized");
        self.state = State::Initialized;
        Ok(())
    }

    /// Insert `records`, then update, retrieve and delete everything, stopping at the first
    /// failure.
    pub async fn run_phases(&mut self, mut records: Vec<Record>) -> Result<()> {
        self.require(State::Initialized, "run phases")?;
        self.state = State::Running;
        for &phase in &Phase::ALL[1..] {
            self.run_phase(phase, &mut records).await?;
        }
        Ok(())
    }

    /// Release the backend handle. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == State::Closed {
            return Ok(());
        }
        self.state = State::Closed;
        if let Some(mut backend) = self.backend.take() {
            backend.close().await?;
            info!(self.log, "Closed"; "backend" => backend.name());
        }
        Ok(())
    }

    /// Connect, clear, run every phase and close.
    ///
    /// The handle is released even when a step fails; the first failure is returned and a failure
    /// to close is logged.
    pub async fn run(mut self, records: Vec<Record>) -> Result<Vec<BenchmarkResult>> {
        let outcome = self.execute(records).await;
        let closed = self.close().await;
        if let Err(err) = &closed {
            error!(self.log, "Close failed: {}", err);
        }
        outcome?;
        closed?;
        Ok(self.results)
    }

    async fn execute(&mut self, records: Vec<Record>) -> Result<()> {
        self.connect().await?;
        self.initialize().await?;
        self.run_phases(records).await
    }

    async fn run_phase(&mut self, phase: Phase, records: &mut Vec<Record>) -> Result<()> {
        let log = self.log.new(o!("phase" => phase.name()));
        let state = self.state;
        let backend = self.backend.as_mut().ok_or(Error::InvalidState {
            operation: phase.name(),
            state,
        })?;

        debug!(log, "Starting phase"; "records" => records.len());
        let started = Instant::now();
        let count = match phase {
            Phase::Clear => backend.clear().await.map(|()| None),
            Phase::Insert => backend.bulk_insert(mem::take(records)).await.map(Some),
            Phase::Update => backend
                .bulk_update(&Selector::All, &Changes::benchmark())
                .await
                .map(Some),
            Phase::Retrieve => backend
                .retrieve_all()
                .await
                .map(|retrieved| Some(retrieved.len() as u64)),
            Phase::Delete => backend.delete_all().await.map(Some),
        };
        let elapsed = started.elapsed();

        let count = count.map_err(|err| {
            error!(log, "Phase failed: {}", err);
            Error::Phase {
                phase,
                source: Box::new(err),
            }
        })?;

        let result = BenchmarkResult {
            phase,
            elapsed,
            count,
        };
        info!(log, "Finished phase"; "elapsed_ms" => elapsed.as_millis() as u64);
        self.reporter.report(&result)?;
        self.results.push(result);
        Ok(())
    }

    fn require(&self, state: State, operation: &'static str) -> Result<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use crate::backend::EmbeddedStore;
    use crate::testing::capture;

    fn discard() -> slog::Logger {
        slog::Logger::root(slog::Discard, o!())
    }

    fn records() -> Vec<Record> {
        vec![
            Record::from_values(vec!["a", "b", "c", "d", "e", "f"]),
            Record::from_values(vec!["x1", "x2", "x3", "x4", "x5", "x6"]),
            Record::from_values(vec!["y1", "y2", "y3", "y4", "y5", "y6"]),
        ]
    }

    struct Embedded;

    #[async_trait]
    impl Connector for Embedded {
        async fn connect(&self, log: &slog::Logger) -> Result<Box<dyn Backend>> {
            Ok(Box::new(EmbeddedStore::temporary(log.clone(), 2)?))
        }
    }

    /// Wraps an embedded store, failing one phase (and optionally the close) and recording whether
    /// it was closed.
    struct Flaky {
        inner: EmbeddedStore,
        fail: Phase,
        fail_close: bool,
        closed: Arc<AtomicBool>,
    }

    impl Flaky {
        fn check(&self, phase: Phase) -> Result<()> {
            if self.fail == phase {
                return Err(io::Error::new(io::ErrorKind::Other, "injected").into());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Backend for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn clear(&mut self) -> Result<()> {
            self.check(Phase::Clear)?;
            self.inner.clear().await
        }

        async fn bulk_insert(&mut self, records: Vec<Record>) -> Result<u64> {
            self.check(Phase::Insert)?;
            self.inner.bulk_insert(records).await
        }

        async fn bulk_update(&mut self, selector: &Selector, changes: &Changes) -> Result<u64> {
            self.check(Phase::Update)?;
            self.inner.bulk_update(selector, changes).await
        }

        async fn retrieve_all(&mut self) -> Result<Vec<Record>> {
            self.check(Phase::Retrieve)?;
            self.inner.retrieve_all().await
        }

        async fn delete_all(&mut self) -> Result<u64> {
            self.check(Phase::Delete)?;
            self.inner.delete_all().await
        }

        async fn close(&mut self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            if self.fail_close {
                return Err(io::Error::new(io::ErrorKind::Other, "close refused").into());
            }
            self.inner.close().await
        }
    }

    struct FlakyConnector {
        fail: Phase,
        fail_close: bool,
        closed: Arc<AtomicBool>,
    }

    impl FlakyConnector {
        fn new(fail: Phase, closed: &Arc<AtomicBool>) -> Self {
            FlakyConnector {
                fail,
                fail_close: false,
                closed: closed.clone(),
            }
        }
    }

    #[async_trait]
    impl Connector for FlakyConnector {
        async fn connect(&self, log: &slog::Logger) -> Result<Box<dyn Backend>> {
            Ok(Box::new(Flaky {
                inner: EmbeddedStore::temporary(log.clone(), 2)?,
                fail: self.fail,
                fail_close: self.fail_close,
                closed: self.closed.clone(),
            }))
        }
    }

    struct Unreachable;

    #[async_trait]
    impl Connector for Unreachable {
        async fn connect(&self, _: &slog::Logger) -> Result<Box<dyn Backend>> {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused").into())
        }
    }

    #[tokio::test]
    async fn full_run_reports_every_phase() {
        let mut out = Vec::new();
        let results = Driver::new(discard(), Embedded, &mut out)
            .run(records())
            .await
            .unwrap();

        let phases: Vec<_> = results.iter().map(|r| r.phase).collect();
        assert_eq!(phases, Phase::ALL.to_vec());
        let counts: Vec<_> = results.iter().map(|r| r.count).collect();
        assert_eq!(counts, vec![None, Some(3), Some(3), Some(3), Some(3)]);

        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("Inserted 3 rows data\n"));
        assert!(output.contains("Updated 3 rows data\n"));
        assert!(output.contains("Retrieved 3 rows data\n"));
        assert!(output.contains("Deleted 3 rows data\n"));
    }

    #[tokio::test]
    async fn failing_phase_aborts_but_closes() {
        let closed = Arc::new(AtomicBool::new(false));
        let connector = FlakyConnector::new(Phase::Update, &closed);
        let mut out = Vec::new();

        let err = Driver::new(discard(), connector, &mut out)
            .run(records())
            .await
            .unwrap_err();

        assert_eq!(err.phase(), Some(Phase::Update));
        assert!(closed.load(Ordering::SeqCst));
        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("Inserted 3 rows data"));
        assert!(!output.contains("Retrieve"));
    }

    #[tokio::test]
    async fn close_failures_after_a_failed_phase_are_logged() {
        let closed = Arc::new(AtomicBool::new(false));
        let connector = FlakyConnector {
            fail_close: true,
            ..FlakyConnector::new(Phase::Clear, &closed)
        };
        let (log, captured) = capture();

        let err = Driver::new(log, connector, io::sink())
            .run(records())
            .await
            .unwrap_err();

        assert_eq!(err.phase(), Some(Phase::Clear));
        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(
            captured.matching("Close failed"),
            vec!["Close failed: IO error: close refused"]
        );
    }

    #[tokio::test]
    async fn phases_are_logged_with_batches() {
        let (log, captured) = capture();
        Driver::new(log, Embedded, io::sink())
            .run(records())
            .await
            .unwrap();

        assert_eq!(captured.matching("Finished phase").len(), 5);
        // Three records in batches of two, for both the insert and the update.
        assert_eq!(
            captured.matching("Wrote batch"),
            vec![
                "Wrote batch size=2",
                "Wrote batch size=1",
                "Wrote batch size=2",
                "Wrote batch size=1",
            ]
        );
    }

    #[tokio::test]
    async fn transitions_step_by_step() {
        let closed = Arc::new(AtomicBool::new(false));
        let connector = FlakyConnector::new(Phase::Delete, &closed);
        let mut driver = Driver::new(discard(), connector, io::sink());
        assert_eq!(driver.state(), State::Disconnected);

        driver.connect().await.unwrap();
        assert_eq!(driver.state(), State::Connected);

        driver.initialize().await.unwrap();
        assert_eq!(driver.state(), State::Initialized);

        assert!(driver.run_phases(records()).await.is_err());
        assert_eq!(driver.state(), State::Running);
        assert_eq!(driver.results().len(), 4);

        driver.close().await.unwrap();
        driver.close().await.unwrap();
        assert_eq!(driver.state(), State::Closed);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn out_of_order_steps_are_rejected() {
        let mut driver = Driver::new(discard(), Embedded, io::sink());

        match driver.initialize().await {
            Err(Error::InvalidState { state: State::Disconnected, .. }) => {}
            other => panic!("expected invalid state, got {:?}", other),
        }
        assert!(driver.run_phases(records()).await.is_err());
    }

    #[tokio::test]
    async fn connection_failure_is_terminal() {
        let mut out = Vec::new();
        let mut driver = Driver::new(discard(), Unreachable, &mut out);

        assert!(driver.connect().await.is_err());
        assert_eq!(driver.state(), State::Closed);
        assert!(driver.connect().await.is_err());
        drop(driver);
        assert!(out.is_empty());
    }
}
