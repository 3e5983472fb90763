//! End-to-end tests over a loopback UDP socket.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use motor_telemetry_config::MonitorConfig;
use motor_telemetry_error_state::MotorErrorKind;
use motor_telemetry_frame::{FrameBatch, MotorFrame};
use motor_telemetry_ingest::{
    LoggingErrorListener, MotorTelemetryPipeline, SeriesStore, TelemetrySource,
};
use motor_telemetry_log::LoggingPolicy;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

struct Fixture {
    pipeline: MotorTelemetryPipeline,
    store: Arc<SeriesStore>,
    sender: UdpSocket,
    target: SocketAddr,
    log_dir: tempfile::TempDir,
}

async fn start(unit_count: usize, policy: LoggingPolicy) -> Result<Fixture> {
    let log_dir = tempfile::tempdir()?;
    let config = MonitorConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        unit_count,
        logging_policy: policy,
        log_dir: log_dir.path().join("logs"),
        receive_timeout_ms: 100,
        shutdown_timeout_ms: 1_000,
        ..MonitorConfig::default()
    };
    let store = Arc::new(SeriesStore::new(256));
    let mut pipeline =
        MotorTelemetryPipeline::new(config, store.clone(), Arc::new(LoggingErrorListener))?;
    let target = pipeline.start().await?;
    let sender = UdpSocket::bind("127.0.0.1:0").await?;

    Ok(Fixture {
        pipeline,
        store,
        sender,
        target,
        log_dir,
    })
}

fn datagram(fixture: &Fixture, error_codes: &[f64]) -> Vec<u8> {
    let frames = error_codes
        .iter()
        .map(|code| MotorFrame {
            position: 0.75,
            temperature: 35.0,
            error_code: *code,
            ..MotorFrame::default()
        })
        .collect();
    fixture
        .pipeline
        .config()
        .codec()
        .encode(&FrameBatch::new(frames))
}

async fn send(fixture: &Fixture, bytes: &[u8]) -> Result<()> {
    fixture.sender.send_to(bytes, fixture.target).await?;
    Ok(())
}

async fn next_frame(frames: &mut broadcast::Receiver<FrameBatch>) -> Result<FrameBatch> {
    let batch = tokio::time::timeout(RECV_TIMEOUT, frames.recv())
        .await
        .context("timed out waiting for a frame")??;
    Ok(batch)
}

fn log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[tokio::test]
async fn error_episode_is_logged_and_reported() -> Result<()> {
    let mut fx = start(2, LoggingPolicy::ErrorTriggered).await?;
    let mut frames = fx.pipeline.subscribe_frames();
    let mut errors = fx.pipeline.subscribe_errors();

    for codes in [[0.0, 0.0], [0.0, 3.0], [0.0, 0.0]] {
        send(&fx, &datagram(&fx, &codes)).await?;
        next_frame(&mut frames).await?;
    }

    let onset = errors.try_recv()?;
    assert_eq!((onset.unit_id, onset.code), (1, 3));
    assert_eq!(onset.kind, MotorErrorKind::Undervoltage);
    let recovery = errors.try_recv()?;
    assert_eq!((recovery.unit_id, recovery.code), (1, 0));
    assert!(errors.try_recv().is_err());

    let files = log_files(&fx.log_dir.path().join("logs"))?;
    assert_eq!(files.len(), 1);
    let path = files.first().context("no log file")?;
    assert!(file_name(path).starts_with("motor_error_log_"));
    let text = std::fs::read_to_string(path)?;
    assert_eq!(text.matches("===== Frame [").count(), 1);
    assert!(text.contains("Motor[1]\n"));
    assert!(text.contains("  Error          : 3.0000\n"));

    assert_eq!(fx.store.latest("Motor2/Pos").map(|s| s.value), Some(0.75));
    let stats = fx.pipeline.stats();
    assert_eq!((stats.received, stats.decoded, stats.rejected), (3, 3, 0));
    assert_eq!(stats.transitions, 2);

    fx.pipeline.shutdown().await?;
    assert!(!fx.pipeline.is_running());
    Ok(())
}

#[tokio::test]
async fn wrong_sized_datagrams_are_dropped() -> Result<()> {
    let mut fx = start(2, LoggingPolicy::ErrorTriggered).await?;
    let mut frames = fx.pipeline.subscribe_frames();

    let good = datagram(&fx, &[0.0, 0.0]);
    let mut oversized = good.clone();
    oversized.push(0);

    send(&fx, good.get(..10).context("datagram too short")?).await?;
    send(&fx, &oversized).await?;
    send(&fx, &good).await?;

    let batch = next_frame(&mut frames).await?;
    assert_eq!(batch.len(), 2);
    assert!(frames.try_recv().is_err());

    let stats = fx.pipeline.stats();
    assert_eq!((stats.received, stats.rejected, stats.decoded), (3, 2, 1));

    fx.pipeline.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn continuous_policy_logs_every_frame() -> Result<()> {
    let mut fx = start(1, LoggingPolicy::ErrorTriggered).await?;
    let mut frames = fx.pipeline.subscribe_frames();
    fx.pipeline.set_logging_policy(LoggingPolicy::Continuous);

    for _ in 0..3 {
        send(&fx, &datagram(&fx, &[0.0])).await?;
        next_frame(&mut frames).await?;
    }
    fx.pipeline.shutdown().await?;

    let files = log_files(&fx.log_dir.path().join("logs"))?;
    assert_eq!(files.len(), 1);
    let path = files.first().context("no log file")?;
    assert!(file_name(path).starts_with("full_log_"));
    let text = std::fs::read_to_string(path)?;
    assert_eq!(text.matches("===== Frame [").count(), 3);
    assert_eq!(fx.pipeline.stats().exported_entries, 3);
    Ok(())
}

#[tokio::test]
async fn injected_data_is_republished() -> Result<()> {
    let mut fx = start(1, LoggingPolicy::ErrorTriggered).await?;

    fx.pipeline
        .set_data(vec![vec![1.0, 2.0, 3.0, 0.0, 40.0, 41.0]])?;
    assert!(fx.pipeline.set_data(vec![vec![1.0]]).is_err());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(fx.store.len("Motor1/Temperature") >= 2);
    assert_eq!(
        fx.store.latest("Motor1/Mos Temperature").map(|s| s.value),
        Some(41.0)
    );

    fx.pipeline.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn pipeline_restarts_after_shutdown() -> Result<()> {
    let mut fx = start(1, LoggingPolicy::ErrorTriggered).await?;
    fx.pipeline.shutdown().await?;

    fx.target = fx.pipeline.start().await?;
    let mut frames = fx.pipeline.subscribe_frames();
    send(&fx, &datagram(&fx, &[0.0])).await?;
    next_frame(&mut frames).await?;

    fx.pipeline.shutdown().await?;
    Ok(())
}
