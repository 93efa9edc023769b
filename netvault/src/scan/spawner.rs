//! Spawner: turns fetch requests into per-device fetch tasks.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures_util::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

use crate::driver::{self, FetchCode, FetchContext, FetchResult};
use crate::table::DeviceTable;

/// A request to fetch one device, answered on `reply` when present.
#[derive(Debug)]
pub struct FetchRequest {
    pub id: String,
    pub reply: Option<mpsc::Sender<FetchResult>>,
}

impl FetchRequest {
    pub fn new(id: impl Into<String>, reply: Option<mpsc::Sender<FetchResult>>) -> Self {
        Self {
            id: id.into(),
            reply,
        }
    }
}

/// Device ids with a fetch running.
#[derive(Debug, Default, Clone)]
struct InFlight {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    /// Claim `id`; `None` if a fetch for it is already running.
    fn claim(&self, id: &str) -> Option<InFlightGuard> {
        let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        if !ids.insert(id.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            ids: self.ids.clone(),
            id: id.to_string(),
        })
    }
}

/// Releases its device id when dropped.
struct InFlightGuard {
    ids: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        ids.remove(&self.id);
    }
}

async fn reply(request: &FetchRequest, result: FetchResult) {
    if let Some(reply) = &request.reply {
        if reply.send(result).await.is_err() {
            debug!("spawner: {}: requester went away", request.id);
        }
    }
}

/// Serve `requests` until the channel closes, then wait for the fetches
/// still running.
///
/// At most `max_concurrency` fetches run at once. A request for a device
/// that already has a fetch running is answered with [`FetchCode::Busy`].
pub async fn run(
    table: Arc<DeviceTable>,
    ctx: FetchContext,
    max_concurrency: usize,
    mut requests: mpsc::Receiver<FetchRequest>,
) {
    let in_flight = InFlight::default();
    let permits = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks: FuturesUnordered<JoinHandle<()>> = FuturesUnordered::new();

    info!("spawner: started, max concurrency {}", max_concurrency.max(1));

    loop {
        tokio::select! {
            request = requests.recv() => {
                let Some(request) = request else { break };
                if let Some(task) = spawn(&table, &ctx, &in_flight, &permits, request).await {
                    tasks.push(task);
                }
            }
            Some(joined) = tasks.next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    warn!("spawner: fetch task failed: {}", e);
                }
            }
        }
    }

    debug!("spawner: request channel closed, draining {} fetches", tasks.len());
    while let Some(joined) = tasks.next().await {
        if let Err(e) = joined {
            warn!("spawner: fetch task failed: {}", e);
        }
    }
    info!("spawner: stopped");
}

async fn spawn(
    table: &Arc<DeviceTable>,
    ctx: &FetchContext,
    in_flight: &InFlight,
    permits: &Arc<Semaphore>,
    request: FetchRequest,
) -> Option<JoinHandle<()>> {
    let device = match table.get_device(&request.id) {
        Ok(device) => device,
        Err(e) => {
            warn!("spawner: {}", e);
            let result = FetchResult::new("", &request.id, "", Utc::now())
                .failed(FetchCode::GetDev, e.to_string());
            reply(&request, result).await;
            return None;
        }
    };

    let Some(guard) = in_flight.claim(&device.id) else {
        debug!("spawner: {}: fetch already running", device.id);
        let result = FetchResult::new(&device.model, &device.id, &device.host_port, Utc::now())
            .failed(FetchCode::Busy, "fetch already running");
        reply(&request, result).await;
        return None;
    };

    let options = table.options();
    let ctx = ctx.clone();
    let permits = permits.clone();

    Some(tokio::spawn(async move {
        let _guard = guard;
        let _permit = permits.acquire_owned().await.ok();
        let result = driver::fetch(&device, options.max_config_files, &ctx).await;
        reply(&request, result).await;
    }))
}
