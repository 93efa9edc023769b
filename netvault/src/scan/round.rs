//! One scan round over the device table.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{TimeDelta, Utc};
use log::{debug, info, warn};
use tokio::sync::mpsc;

use super::spawner::FetchRequest;
use crate::driver::{FetchCode, FetchResult};
use crate::table::DeviceTable;

/// Outcome counts of a scan round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub good: usize,
    pub bad: usize,
    /// Held back by holdtime or already being fetched.
    pub skipped: usize,
    /// Shortest, longest and summed fetch time.
    pub min: Duration,
    pub max: Duration,
    pub total: Duration,
    /// Wall time of the round.
    pub duration: Duration,
}

impl ScanSummary {
    pub fn fetched(&self) -> usize {
        self.good + self.bad
    }

    pub fn average(&self) -> Duration {
        match self.fetched() {
            0 => Duration::ZERO,
            n => self.total / n as u32,
        }
    }

    fn record(&mut self, result: &FetchResult) {
        if result.code == FetchCode::Busy {
            self.skipped += 1;
            return;
        }
        if result.is_success() {
            self.good += 1;
        } else {
            self.bad += 1;
        }
        if self.fetched() == 1 || result.elapsed < self.min {
            self.min = result.elapsed;
        }
        self.max = self.max.max(result.elapsed);
        self.total += result.elapsed;
    }
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "good={} bad={} skipped={} min={:?} avg={:?} max={:?} elapsed={:?}",
            self.good,
            self.bad,
            self.skipped,
            self.min,
            self.average(),
            self.max,
            self.duration
        )
    }
}

fn absorb(table: &DeviceTable, summary: &mut ScanSummary, result: FetchResult) {
    if result.code != FetchCode::Busy {
        if let Err(e) = table.update_device_status(&result) {
            debug!("scan: {}", e);
        }
    }
    summary.record(&result);
}

/// Request a fetch of every live device whose holdtime has expired and
/// wait for all of them.
///
/// No more than `max_concurrency` requests are outstanding at once.
pub async fn scan(table: &DeviceTable, requests: &mpsc::Sender<FetchRequest>) -> ScanSummary {
    let begin = Instant::now();
    let options = table.options();
    let max_concurrency = options.max_concurrency.max(1);
    let now = Utc::now();

    let (reply_tx, mut reply_rx) = mpsc::channel(max_concurrency);
    let mut summary = ScanSummary::default();
    let mut pending = 0usize;

    let devices = table.list_devices();
    info!("scan: starting, {} devices", devices.len());

    for device in devices {
        if device.deleted {
            continue;
        }
        let hold = device.holdtime(now, options.holdtime);
        if hold > TimeDelta::zero() {
            debug!("scan: {}: holdtime {}s left", device.id, hold.num_seconds());
            summary.skipped += 1;
            continue;
        }

        let request = FetchRequest::new(device.id.as_str(), Some(reply_tx.clone()));
        if requests.send(request).await.is_err() {
            warn!("scan: spawner is gone, stopping round");
            break;
        }
        pending += 1;

        if pending >= max_concurrency {
            if let Some(result) = reply_rx.recv().await {
                pending -= 1;
                absorb(table, &mut summary, result);
            }
        }
    }

    drop(reply_tx);
    while pending > 0 {
        let Some(result) = reply_rx.recv().await else {
            warn!("scan: {} requests left unanswered", pending);
            break;
        };
        pending -= 1;
        absorb(table, &mut summary, result);
    }

    summary.duration = begin.elapsed();
    info!("scan: done: {}", summary);
    summary
}
