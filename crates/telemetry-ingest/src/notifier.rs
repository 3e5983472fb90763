//! Fixed-rate re-publication of the last known frame.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, trace};

use crate::ingestor::seconds_since_epoch;
use crate::sink::TelemetrySink;
use crate::state::FrameState;

/// Publish `state` to `sink` every `period` until `shutdown` flips or closes.
pub(crate) async fn run_notifier(
    state: Arc<FrameState>,
    sink: Arc<dyn TelemetrySink>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(?period, "Motor telemetry notifier started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if !state.publish(sink.as_ref(), seconds_since_epoch(&Local::now())) {
                    trace!("No motor telemetry to publish yet");
                }
            }
        }
    }

    debug!("Motor telemetry notifier stopped");
}
