//! Timed liveness polling.
//!
//! Waiting for a broadcast to start and waiting for it to come back after a
//! drop are the same loop: probe at a fixed interval until the probe succeeds
//! or the budget is spent. They differ only in the budget and in whether the
//! first probe happens immediately or one interval later.

use std::future::Future;
use std::time::Duration;

use streamrec_proto::LivenessOracle;
use tracing::{debug, info, warn};

/// Shape of a polling wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// Time between probes.
    pub interval: Duration,
    /// Total time the wait may sleep before giving up.
    pub budget: Duration,
    /// Sleep one interval before the first probe.
    pub delay_first: bool,
}

impl PollSchedule {
    /// Probe immediately, then every `interval`, for up to `budget`.
    pub fn immediate(budget: Duration, interval: Duration) -> Self {
        Self {
            interval,
            budget,
            delay_first: false,
        }
    }

    /// Sleep `interval` first, then probe after every sleep, for up to `budget`.
    pub fn delayed(budget: Duration, interval: Duration) -> Self {
        Self {
            interval,
            budget,
            delay_first: true,
        }
    }
}

/// Polls `probe` on `schedule` until it returns true or the budget runs out.
///
/// The budget counts time spent sleeping, so a wait never probes more often
/// than once per interval. A zero interval probes exactly once.
pub async fn poll_until<F, Fut>(schedule: PollSchedule, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    if schedule.interval.is_zero() {
        return probe().await;
    }

    let mut waited = Duration::ZERO;
    while waited < schedule.budget {
        if schedule.delay_first {
            tokio::time::sleep(schedule.interval).await;
            waited += schedule.interval;
        }

        if probe().await {
            return true;
        }

        if !schedule.delay_first {
            tokio::time::sleep(schedule.interval).await;
            waited += schedule.interval;
        }

        debug!(
            "Still offline... ({}/{}s)",
            waited.as_secs(),
            schedule.budget.as_secs()
        );
    }
    false
}

/// Blocks until `channel` goes live or `timeout` elapses.
///
/// Probes at t=0 and then every `interval`. Returns true the first time the
/// probe succeeds.
pub async fn wait_until_live(
    oracle: &dyn LivenessOracle,
    channel: &str,
    quality: &str,
    timeout: Duration,
    interval: Duration,
) -> bool {
    info!(
        "Waiting for {} to go live (timeout: {}s, checking every {}s)...",
        channel,
        timeout.as_secs(),
        interval.as_secs()
    );

    let live = poll_until(PollSchedule::immediate(timeout, interval), || {
        oracle.probe(channel, quality)
    })
    .await;

    if live {
        info!("Stream is LIVE!");
    } else {
        warn!("Stream did not go live within {}s.", timeout.as_secs());
    }
    live
}

/// After a capture ends, waits up to `grace_period` for the stream to return.
///
/// The grace period counts from the end of the capture, so the first probe
/// happens one `check_interval` in.
pub async fn wait_for_reconnect(
    oracle: &dyn LivenessOracle,
    channel: &str,
    quality: &str,
    grace_period: Duration,
    check_interval: Duration,
) -> bool {
    info!(
        "Stream dropped. Waiting up to {}s for it to return...",
        grace_period.as_secs()
    );

    let back = poll_until(PollSchedule::delayed(grace_period, check_interval), || {
        oracle.probe(channel, quality)
    })
    .await;

    if back {
        info!("Stream is back online!");
    } else {
        info!("Stream did not return within {}s.", grace_period.as_secs());
    }
    back
}
