//! Fetch scheduling.
//!
//! A single spawner task owns fetch execution. Two producers feed it: the
//! periodic scan loop, which walks the device table once per interval,
//! and the priority loop, which forwards on-demand requests by device id.
//!
//! ```text
//! scan loop ──┐
//!             ├──> spawner ──> fetch tasks ──> reply channels
//! priority ───┘
//! ```

mod round;
mod spawner;

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use round::{scan, ScanSummary};
pub use spawner::FetchRequest;

use crate::driver::{FetchCode, FetchContext};
use crate::table::DeviceTable;

const REQUEST_QUEUE: usize = 64;

/// Running spawner and priority loop plus the channels feeding them.
#[derive(Debug)]
pub struct Scheduler {
    table: Arc<DeviceTable>,
    requests: mpsc::Sender<FetchRequest>,
    priority: mpsc::Sender<String>,
    spawner: JoinHandle<()>,
    priority_loop: JoinHandle<()>,
}

impl Scheduler {
    /// Start the spawner and the priority loop.
    ///
    /// The overall fetch limit is taken from the table options at start.
    pub fn start(table: Arc<DeviceTable>, ctx: FetchContext) -> Self {
        let max_concurrency = table.options().max_concurrency;
        let (requests, requests_rx) = mpsc::channel(REQUEST_QUEUE);
        let (priority, priority_rx) = mpsc::channel(REQUEST_QUEUE);

        let spawner = tokio::spawn(spawner::run(table.clone(), ctx, max_concurrency, requests_rx));
        let priority_loop =
            tokio::spawn(run_priority(table.clone(), priority_rx, requests.clone()));

        Self {
            table,
            requests,
            priority,
            spawner,
            priority_loop,
        }
    }

    pub fn table(&self) -> &Arc<DeviceTable> {
        &self.table
    }

    /// Sender for raw fetch requests.
    pub fn requests(&self) -> mpsc::Sender<FetchRequest> {
        self.requests.clone()
    }

    /// Queue an immediate fetch of `id`, bypassing holdtime.
    pub async fn fetch_now(&self, id: impl Into<String>) -> bool {
        self.priority.send(id.into()).await.is_ok()
    }

    /// Run one scan round.
    pub async fn scan(&self) -> ScanSummary {
        scan(&self.table, &self.requests).await
    }

    /// Scan forever, starting a round every `scan_interval` from the start
    /// of the previous one.
    pub async fn run_loop(&self) {
        loop {
            let begin = Instant::now();
            self.scan().await;
            if self.requests.is_closed() {
                warn!("scan loop: spawner is gone");
                return;
            }

            let interval = self.table.options().scan_interval;
            let pause = interval.saturating_sub(begin.elapsed());
            info!("scan loop: sleeping {:?}", pause);
            tokio::time::sleep(pause).await;
        }
    }

    /// Stop accepting requests and wait for running fetches to finish.
    pub async fn shutdown(self) {
        let Self {
            requests,
            priority,
            spawner,
            priority_loop,
            ..
        } = self;

        drop(priority);
        if let Err(e) = priority_loop.await {
            warn!("scheduler: priority loop: {}", e);
        }
        drop(requests);
        if let Err(e) = spawner.await {
            warn!("scheduler: spawner: {}", e);
        }
    }
}

/// Forward on-demand ids to the spawner and record their results.
async fn run_priority(
    table: Arc<DeviceTable>,
    mut priority: mpsc::Receiver<String>,
    requests: mpsc::Sender<FetchRequest>,
) {
    while let Some(id) = priority.recv().await {
        debug!("priority: {}", id);
        let (reply_tx, mut reply_rx) = mpsc::channel(1);
        if requests.send(FetchRequest::new(id, Some(reply_tx))).await.is_err() {
            warn!("priority: spawner is gone");
            return;
        }

        let table = table.clone();
        tokio::spawn(async move {
            let Some(result) = reply_rx.recv().await else { return };
            if result.code == FetchCode::Busy {
                return;
            }
            if let Err(e) = table.update_device_status(&result) {
                debug!("priority: {}", e);
            }
        });
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::platform::{vendors, ModelRegistry};
    use crate::store::Repository;
    use crate::table::Device;

    fn setup(scripts: &[(&str, &str)]) -> (Arc<DeviceTable>, FetchContext, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let table = Arc::new(DeviceTable::new(ModelRegistry::with_builtin()));
        for (id, script) in scripts {
            let model = vendors::run::model();
            let mut device = Device::new(*id, &model, "localhost", "", "u", "p", "");
            device.attributes.run_prog = vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                script.to_string(),
            ];
            device.attributes.run_timeout = Duration::from_secs(5);
            table.set_device(device).unwrap();
        }
        let ctx = FetchContext::new(Repository::local(), dir.path());
        (table, ctx, dir)
    }

    #[tokio::test]
    async fn test_scan_round_and_holdtime() {
        let (table, ctx, _dir) = setup(&[("a", "echo a"), ("b", "echo b"), ("c", "")]);
        let mut broken = table.get_device("c").unwrap();
        broken.attributes.run_prog = vec!["/nonexistent/netvault-helper".to_string()];
        table.update_device(broken).unwrap();
        let scheduler = Scheduler::start(table.clone(), ctx);

        let first = scheduler.scan().await;
        assert_eq!(first.good, 2);
        assert_eq!(first.bad, 1);
        assert_eq!(first.skipped, 0);
        assert!(table.get_device("a").unwrap().status.last_success.is_some());

        // successful devices are held back, the failed one is retried
        let second = scheduler.scan().await;
        assert_eq!(second.skipped, 2);
        assert_eq!(second.fetched(), 1);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_deleted_device_is_not_scanned() {
        let (table, ctx, _dir) = setup(&[("a", "echo a")]);
        table.delete_device("a").unwrap();
        let scheduler = Scheduler::start(table, ctx);

        let summary = scheduler.scan().await;
        assert_eq!(summary, ScanSummary { duration: summary.duration, ..Default::default() });

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_priority_fetch_ignores_holdtime() {
        let (table, ctx, _dir) = setup(&[("a", "echo a")]);
        let scheduler = Scheduler::start(table.clone(), ctx);

        scheduler.scan().await;
        let first = table.get_device("a").unwrap().status.last_try;

        assert!(scheduler.fetch_now("a").await);
        let mut updated = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if table.get_device("a").unwrap().status.last_try != first {
                updated = true;
                break;
            }
        }
        assert!(updated);

        scheduler.shutdown().await;
    }
}
