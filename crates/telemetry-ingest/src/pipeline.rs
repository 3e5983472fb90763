//! Pipeline lifecycle: socket, background tasks, shutdown.

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use motor_telemetry_config::MonitorConfig;
use motor_telemetry_error_state::ErrorTransition;
use motor_telemetry_frame::FrameBatch;
use motor_telemetry_log::{FileSink, LogSink, LoggingPolicy};
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::IngestError;
use crate::ingestor::{IngestOutputs, Ingestor, seconds_since_epoch};
use crate::listener::ErrorStateListener;
use crate::notifier::run_notifier;
use crate::sink::TelemetrySink;
use crate::state::FrameState;
use crate::stats::{IngestStats, IngestStatsSnapshot};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A start/stop-able producer of decoded frames and error events.
#[async_trait]
pub trait TelemetrySource: Send {
    /// Bind and start the background tasks, returning the bound address.
    async fn start(&mut self) -> Result<SocketAddr, IngestError>;

    /// Stop the background tasks and wait for them, within a bounded time.
    async fn shutdown(&mut self) -> Result<(), IngestError>;

    fn is_running(&self) -> bool;

    /// Every decoded batch, in arrival order.
    fn subscribe_frames(&self) -> broadcast::Receiver<FrameBatch>;

    /// Every error-state transition.
    fn subscribe_errors(&self) -> broadcast::Receiver<ErrorTransition>;
}

/// Log destination shared by every ingestor the pipeline builds.
#[derive(Clone)]
struct SharedLogSink(Arc<Mutex<Box<dyn LogSink>>>);

impl LogSink for SharedLogSink {
    fn append(&mut self, path: &Path, contents: &str) -> io::Result<()> {
        self.0.lock().append(path, contents)
    }
}

/// State moved into the ingestion task.
struct IngestionTask {
    socket: UdpSocket,
    ingestor: Ingestor,
    policy: Arc<AtomicU8>,
    frames_tx: broadcast::Sender<FrameBatch>,
    errors_tx: broadcast::Sender<ErrorTransition>,
    receive_timeout: Duration,
    shutdown: watch::Receiver<bool>,
}

/// UDP motor telemetry pipeline.
///
/// Created once by the host, then started and shut down explicitly. Dropping a
/// running pipeline signals its tasks to stop without waiting for them.
pub struct MotorTelemetryPipeline {
    config: MonitorConfig,
    state: Arc<FrameState>,
    sink: Arc<dyn TelemetrySink>,
    listener: Arc<dyn ErrorStateListener>,
    stats: Arc<IngestStats>,
    log_sink: SharedLogSink,
    policy: Arc<AtomicU8>,
    running: Arc<AtomicBool>,
    frames_tx: broadcast::Sender<FrameBatch>,
    errors_tx: broadcast::Sender<ErrorTransition>,
    /// Held between runs so tracker and episode state survive a restart.
    ingestor: Option<Ingestor>,
    shutdown_tx: Option<watch::Sender<bool>>,
    ingestion_task: Option<JoinHandle<Ingestor>>,
    notifier_task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl MotorTelemetryPipeline {
    /// Build a pipeline writing log files through [`FileSink`].
    ///
    /// Registers every series with `sink` and creates the log directory. A log
    /// directory that cannot be created is reported but does not prevent
    /// ingestion; exports fail and are retried until it exists.
    ///
    /// # Errors
    ///
    /// Fails if `config` does not validate.
    pub fn new(
        config: MonitorConfig,
        sink: Arc<dyn TelemetrySink>,
        listener: Arc<dyn ErrorStateListener>,
    ) -> Result<Self, IngestError> {
        Self::with_log_sink(config, sink, listener, Box::new(FileSink))
    }

    /// Like [`MotorTelemetryPipeline::new`] with a custom log destination.
    ///
    /// # Errors
    ///
    /// Fails if `config` does not validate.
    pub fn with_log_sink(
        config: MonitorConfig,
        sink: Arc<dyn TelemetrySink>,
        listener: Arc<dyn ErrorStateListener>,
        log_sink: Box<dyn LogSink>,
    ) -> Result<Self, IngestError> {
        config.validate()?;

        match config.ensure_log_dir() {
            Ok(dir) => debug!(log_dir = %dir.display(), "Log directory ready"),
            Err(err) => error!(
                error = %err,
                "Motor log directory unavailable; log exports will fail until it exists"
            ),
        }

        let state = Arc::new(FrameState::new(
            config.unit_count,
            config.effective_selection(),
        ));
        for name in state.series_names() {
            sink.register_series(name);
        }

        let stats = Arc::new(IngestStats::new());
        let log_sink = SharedLogSink(Arc::new(Mutex::new(log_sink)));
        let outputs = IngestOutputs {
            state: Arc::clone(&state),
            sink: Arc::clone(&sink),
            listener: Arc::clone(&listener),
            stats: Arc::clone(&stats),
        };
        let ingestor = Ingestor::new(
            &config,
            Box::new(log_sink.clone()) as Box<dyn LogSink>,
            outputs,
        );
        let (frames_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (errors_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            policy: Arc::new(AtomicU8::new(config.logging_policy.as_u8())),
            config,
            state,
            sink,
            listener,
            stats,
            log_sink,
            running: Arc::new(AtomicBool::new(false)),
            frames_tx,
            errors_tx,
            ingestor: Some(ingestor),
            shutdown_tx: None,
            ingestion_task: None,
            notifier_task: None,
            local_addr: None,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Address the socket is bound to while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn logging_policy(&self) -> LoggingPolicy {
        LoggingPolicy::from_u8(self.policy.load(Ordering::Acquire))
    }

    /// Change the logging policy. Applies from the next datagram on; entries
    /// already buffered are kept.
    pub fn set_logging_policy(&self, policy: LoggingPolicy) {
        let previous = LoggingPolicy::from_u8(self.policy.swap(policy.as_u8(), Ordering::AcqRel));
        if previous != policy {
            info!(%previous, %policy, "Logging policy changed");
        }
    }

    /// Replace the current values with an already projected matrix and
    /// publish them right away.
    ///
    /// # Errors
    ///
    /// Rejects a matrix that is not `unit_count x fields_per_unit`.
    pub fn set_data(&self, data: Vec<Vec<f64>>) -> Result<(), IngestError> {
        self.state.set_data(data)?;
        self.state
            .publish(self.sink.as_ref(), seconds_since_epoch(&Local::now()));
        Ok(())
    }

    pub fn frame_state(&self) -> &Arc<FrameState> {
        &self.state
    }

    pub fn series_names(&self) -> &[String] {
        self.state.series_names()
    }

    pub fn stats(&self) -> IngestStatsSnapshot {
        self.stats.snapshot()
    }

    fn take_ingestor(&mut self) -> Ingestor {
        self.ingestor.take().unwrap_or_else(|| {
            warn!("Rebuilding ingestor; error-state tracking starts over");
            let outputs = IngestOutputs {
                state: Arc::clone(&self.state),
                sink: Arc::clone(&self.sink),
                listener: Arc::clone(&self.listener),
                stats: Arc::clone(&self.stats),
            };
            let log_sink: Box<dyn LogSink> = Box::new(self.log_sink.clone());
            Ingestor::new(&self.config, log_sink, outputs)
        })
    }
}

#[async_trait]
impl TelemetrySource for MotorTelemetryPipeline {
    async fn start(&mut self) -> Result<SocketAddr, IngestError> {
        if self.is_running() {
            return Err(IngestError::AlreadyRunning);
        }
        if self.running.load(Ordering::Acquire) {
            warn!("Motor telemetry ingestion stopped unexpectedly; cleaning up before restart");
            self.shutdown().await?;
        }

        let addr = self.config.listen_addr;
        let socket = UdpSocket::bind(addr).await.map_err(|source| {
            error!(%addr, error = %source, "Failed to bind motor telemetry socket");
            IngestError::Bind { addr, source }
        })?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| IngestError::Bind { addr, source })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = IngestionTask {
            socket,
            ingestor: self.take_ingestor(),
            policy: Arc::clone(&self.policy),
            frames_tx: self.frames_tx.clone(),
            errors_tx: self.errors_tx.clone(),
            receive_timeout: self.config.receive_timeout(),
            shutdown: shutdown_rx.clone(),
        };

        self.running.store(true, Ordering::Release);
        self.ingestion_task = Some(tokio::spawn(run_ingestion(task)));
        self.notifier_task = Some(tokio::spawn(run_notifier(
            Arc::clone(&self.state),
            Arc::clone(&self.sink),
            self.config.refresh_interval(),
            shutdown_rx,
        )));
        self.shutdown_tx = Some(shutdown_tx);
        self.local_addr = Some(local_addr);

        info!(
            %local_addr,
            unit_count = self.config.unit_count,
            policy = %self.logging_policy(),
            "Motor telemetry pipeline listening"
        );
        Ok(local_addr)
    }

    async fn shutdown(&mut self) -> Result<(), IngestError> {
        if !self.running.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        info!("Stopping motor telemetry pipeline");
        if let Some(shutdown_tx) = self.shutdown_tx.take()
            && shutdown_tx.send(true).is_err()
        {
            debug!("Pipeline tasks already gone");
        }

        let timeout = self.config.shutdown_timeout();
        if let Some(mut handle) = self.ingestion_task.take() {
            match tokio::time::timeout(timeout, &mut handle).await {
                Ok(Ok(ingestor)) => self.ingestor = Some(ingestor),
                Ok(Err(err)) => error!(error = %err, "Ingestion task failed"),
                Err(_) => {
                    warn!(?timeout, "Ingestion task did not stop in time; aborting");
                    handle.abort();
                }
            }
        }
        if let Some(mut handle) = self.notifier_task.take() {
            match tokio::time::timeout(timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(error = %err, "Notifier task failed"),
                Err(_) => {
                    warn!(?timeout, "Notifier task did not stop in time; aborting");
                    handle.abort();
                }
            }
        }

        self.local_addr = None;
        info!(stats = ?self.stats.snapshot(), "Motor telemetry pipeline stopped");
        Ok(())
    }

    /// False once stopped, or when the ingestion task has died.
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self
                .ingestion_task
                .as_ref()
                .is_some_and(|task| !task.is_finished())
    }

    fn subscribe_frames(&self) -> broadcast::Receiver<FrameBatch> {
        self.frames_tx.subscribe()
    }

    fn subscribe_errors(&self) -> broadcast::Receiver<ErrorTransition> {
        self.errors_tx.subscribe()
    }
}

impl Drop for MotorTelemetryPipeline {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(shutdown_tx) = self.shutdown_tx.take()
            && shutdown_tx.send(true).is_err()
        {
            trace!("Pipeline tasks already gone at drop");
        }
    }
}

async fn run_ingestion(mut task: IngestionTask) -> Ingestor {
    // One spare byte so oversized datagrams show up as a length mismatch.
    let mut buf = vec![0u8; task.ingestor.expected_len().saturating_add(1)];
    let mut quiet = false;

    loop {
        let received = tokio::select! {
            biased;
            changed = task.shutdown.changed() => {
                if changed.is_err() || *task.shutdown.borrow() {
                    break;
                }
                continue;
            }
            received = tokio::time::timeout(task.receive_timeout, task.socket.recv(&mut buf)) => received,
        };

        let len = match received {
            Ok(Ok(len)) => len,
            Ok(Err(err)) => {
                warn!(error = %err, "Motor telemetry receive error");
                continue;
            }
            Err(_) => {
                if !quiet {
                    info!(timeout = ?task.receive_timeout, "No motor telemetry received");
                    quiet = true;
                }
                continue;
            }
        };
        if quiet {
            info!("Motor telemetry resumed");
            quiet = false;
        }

        let Some(datagram) = buf.get(..len) else {
            continue;
        };
        let policy = LoggingPolicy::from_u8(task.policy.load(Ordering::Acquire));
        let Ok(processed) = task
            .ingestor
            .process_datagram(datagram, policy, Local::now())
        else {
            continue;
        };

        for transition in &processed.transitions {
            if task.errors_tx.send(*transition).is_err() {
                trace!("No error-state subscribers");
            }
        }
        if task.frames_tx.send(processed.batch).is_err() {
            trace!("No frame subscribers");
        }
    }

    debug!("Motor telemetry ingestion stopped");
    task.ingestor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::LoggingErrorListener;
    use crate::sink::SeriesStore;
    use motor_telemetry_config::ConfigError;
    use motor_telemetry_frame::MotorFrame;
    use motor_telemetry_log::MemorySink;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[derive(Clone, Default)]
    struct SharedMemorySink(Arc<Mutex<MemorySink>>);

    impl LogSink for SharedMemorySink {
        fn append(&mut self, path: &Path, contents: &str) -> io::Result<()> {
            self.0.lock().append(path, contents)
        }
    }

    /// Takes down whichever task publishes to it.
    struct CrashingSink;

    impl TelemetrySink for CrashingSink {
        fn register_series(&self, _name: &str) {}

        #[allow(clippy::panic, reason = "stands in for a consumer that crashes")]
        fn append(&self, _name: &str, _timestamp_s: f64, _value: f64) {
            panic!("series consumer crashed");
        }
    }

    fn test_config(log_dir: &std::path::Path) -> MonitorConfig {
        MonitorConfig {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            unit_count: 2,
            log_dir: log_dir.to_path_buf(),
            receive_timeout_ms: 50,
            shutdown_timeout_ms: 500,
            ..MonitorConfig::default()
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = MonitorConfig {
            unit_count: 0,
            ..MonitorConfig::default()
        };
        let result = MotorTelemetryPipeline::new(
            config,
            Arc::new(SeriesStore::new(8)),
            Arc::new(LoggingErrorListener),
        );
        assert!(matches!(
            result,
            Err(IngestError::Config(ConfigError::NoUnits))
        ));
    }

    #[test]
    fn registers_series_at_construction() -> TestResult {
        let dir = tempfile::tempdir()?;
        let store = Arc::new(SeriesStore::new(8));
        let pipeline = MotorTelemetryPipeline::new(
            test_config(dir.path()),
            store.clone(),
            Arc::new(LoggingErrorListener),
        )?;

        assert_eq!(store.series_names(), pipeline.series_names());
        assert_eq!(
            store.series_names().first().map(String::as_str),
            Some("Motor1/Pos")
        );
        assert_eq!(store.series_names().len(), 12);
        Ok(())
    }

    #[test]
    fn policy_can_be_switched() -> TestResult {
        let dir = tempfile::tempdir()?;
        let pipeline = MotorTelemetryPipeline::new(
            test_config(dir.path()),
            Arc::new(SeriesStore::new(8)),
            Arc::new(LoggingErrorListener),
        )?;

        assert_eq!(pipeline.logging_policy(), LoggingPolicy::ErrorTriggered);
        pipeline.set_logging_policy(LoggingPolicy::Continuous);
        assert_eq!(pipeline.logging_policy(), LoggingPolicy::Continuous);
        Ok(())
    }

    #[test]
    fn injected_data_is_published_immediately() -> TestResult {
        let dir = tempfile::tempdir()?;
        let store = Arc::new(SeriesStore::new(8));
        let pipeline = MotorTelemetryPipeline::new(
            test_config(dir.path()),
            store.clone(),
            Arc::new(LoggingErrorListener),
        )?;

        pipeline.set_data(vec![vec![1.0, 2.0, 3.0, 0.0, 40.0, 41.0]; 2])?;

        assert_eq!(store.len("Motor1/Pos"), 1);
        assert_eq!(
            store.latest("Motor2/Mos Temperature").map(|s| s.value),
            Some(41.0)
        );
        Ok(())
    }

    #[test]
    fn rebuilt_ingestor_keeps_custom_log_sink() -> TestResult {
        let dir = tempfile::tempdir()?;
        let memory = SharedMemorySink::default();
        let mut pipeline = MotorTelemetryPipeline::with_log_sink(
            test_config(dir.path()),
            Arc::new(SeriesStore::new(8)),
            Arc::new(LoggingErrorListener),
            Box::new(memory.clone()),
        )?;

        // As after an ingestion task that had to be aborted.
        pipeline.ingestor = None;
        let mut ingestor = pipeline.take_ingestor();
        let faulted = MotorFrame {
            error_code: 2.0,
            ..MotorFrame::default()
        };
        let datagram = pipeline
            .config()
            .codec()
            .encode(&FrameBatch::new(vec![faulted; 2]));
        let processed =
            ingestor.process_datagram(&datagram, LoggingPolicy::ErrorTriggered, Local::now())?;

        assert!(processed.exported.is_some());
        assert_eq!(memory.0.lock().paths().len(), 1);
        let files = std::fs::read_dir(dir.path())?.count();
        assert_eq!(files, 0);
        Ok(())
    }

    #[tokio::test]
    async fn crashed_ingestion_is_not_running_and_can_restart() -> TestResult {
        let dir = tempfile::tempdir()?;
        let mut pipeline = MotorTelemetryPipeline::new(
            test_config(dir.path()),
            Arc::new(CrashingSink),
            Arc::new(LoggingErrorListener),
        )?;
        let target = pipeline.start().await?;

        let datagram =
            pipeline
                .config()
                .codec()
                .encode(&FrameBatch::new(vec![MotorFrame::default(); 2]));
        let sender = UdpSocket::bind("127.0.0.1:0").await?;
        sender.send_to(&datagram, target).await?;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while pipeline.is_running() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!pipeline.is_running());

        pipeline.start().await?;
        assert!(pipeline.is_running());
        pipeline.shutdown().await?;
        assert!(!pipeline.is_running());
        Ok(())
    }

    #[tokio::test]
    async fn start_twice_is_rejected_and_shutdown_is_idempotent() -> TestResult {
        let dir = tempfile::tempdir()?;
        let mut pipeline = MotorTelemetryPipeline::new(
            test_config(dir.path()),
            Arc::new(SeriesStore::new(8)),
            Arc::new(LoggingErrorListener),
        )?;

        let addr = pipeline.start().await?;
        assert_ne!(addr.port(), 0);
        assert!(pipeline.is_running());
        assert!(matches!(
            pipeline.start().await,
            Err(IngestError::AlreadyRunning)
        ));

        pipeline.shutdown().await?;
        assert!(!pipeline.is_running());
        assert_eq!(pipeline.local_addr(), None);
        pipeline.shutdown().await?;
        Ok(())
    }

    #[tokio::test]
    async fn bind_failure_is_fatal_to_start() -> TestResult {
        let dir = tempfile::tempdir()?;
        let blocker = std::net::UdpSocket::bind("127.0.0.1:0")?;
        let config = MonitorConfig {
            listen_addr: blocker.local_addr()?,
            ..test_config(dir.path())
        };
        let mut pipeline = MotorTelemetryPipeline::new(
            config,
            Arc::new(SeriesStore::new(8)),
            Arc::new(LoggingErrorListener),
        )?;

        assert!(matches!(
            pipeline.start().await,
            Err(IngestError::Bind { .. })
        ));
        assert!(!pipeline.is_running());
        Ok(())
    }
}
