//! One fetch: connect, run the dialog, save the capture, log the outcome.

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use log::{debug, info, warn};

use super::capture::Capture;
use super::dialog::{Credentials, Dialog};
use super::response::{FetchCode, FetchResult};
use crate::channel::{Session, SessionConfig};
use crate::store::{errlog, Prefix, Repository};
use crate::table::Device;
use crate::transport::{self, DialOptions, Endpoint, ProcessStream, Stream, TransportKind};

/// Shared collaborators of every fetch.
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub repository: Repository,
    /// Root of the per-device capture directories.
    pub repository_path: PathBuf,
    pub dial: DialOptions,
}

impl FetchContext {
    pub fn new(repository: Repository, repository_path: impl Into<PathBuf>) -> Self {
        Self {
            repository,
            repository_path: repository_path.into(),
            dial: DialOptions::default(),
        }
    }

    pub fn device_prefix(&self, id: &str) -> Prefix {
        Prefix::for_device(&self.repository_path, id)
    }
}

type Failure = (FetchCode, String);

/// Fetch `device` and save its capture, keeping at most `max_config_files`
/// snapshots. Never fails: the outcome is carried on the result.
pub async fn fetch(device: &Device, max_config_files: usize, ctx: &FetchContext) -> FetchResult {
    let started = Instant::now();
    let mut result = FetchResult::new(&device.model, &device.id, &device.host_port, Utc::now());

    if let Err((code, message)) = run(device, max_config_files, ctx, &mut result).await {
        result = result.failed(code, message);
    }
    result.elapsed = started.elapsed();

    if result.is_success() {
        info!("{}", result);
    } else {
        warn!("{}", result);
    }

    record_errlog(device, ctx, &result).await;
    result
}

async fn run(
    device: &Device,
    max_config_files: usize,
    ctx: &FetchContext,
    result: &mut FetchResult,
) -> Result<(), Failure> {
    let attrs = &device.attributes;
    let label = format!("{} {} {}", device.model, device.id, device.host_port);

    let (stream, kind, logged) = connect(device, &ctx.dial).await?;
    result.transport = kind.to_string();
    debug!("{}: connected over {} logged={}", label, kind, logged);

    let session = Session::new(
        stream,
        SessionConfig {
            timeouts: attrs.timeouts(),
            keep_control_chars: attrs.keep_control_chars,
            suppress_auto_lf: attrs.suppress_auto_lf,
            debug: device.debug,
            label: label.clone(),
        },
    );
    let credentials = Credentials {
        user: &device.login_user,
        password: &device.login_password,
        enable_password: &device.enable_password,
    };

    let mut dialog = Dialog::new(session, attrs, credentials);
    let outcome = dialog.run(logged).await;
    let (session, capture) = dialog.into_parts();
    if let Err(e) = session.close().await {
        debug!("{}: close: {}", label, e);
    }
    outcome.map_err(|e| (e.code, e.to_string()))?;

    save(device, max_config_files, ctx, capture).await
}

async fn connect(
    device: &Device,
    dial: &DialOptions,
) -> Result<(Stream, TransportKind, bool), Failure> {
    let attrs = &device.attributes;

    if attrs.runs_program() {
        let process = ProcessStream::spawn(&attrs.run_prog, &process_env(device), attrs.run_timeout)
            .map_err(|e| (FetchCode::Transport, e.to_string()))?;
        return Ok((Stream::from_process(process), TransportKind::Process, true));
    }

    let endpoint = Endpoint {
        model: &device.model,
        device_id: &device.id,
        host_port: &device.host_port,
        transports: &device.transports,
        user: &device.login_user,
        password: &device.login_password,
    };
    let opened = transport::open(&endpoint, dial)
        .await
        .map_err(|e| (FetchCode::Transport, e.to_string()))?;
    Ok((opened.stream, opened.kind, opened.logged))
}

/// Environment handed to `run_prog`.
fn process_env(device: &Device) -> Vec<(String, String)> {
    [
        ("NETVAULT_DEV_ID", &device.id),
        ("NETVAULT_DEV_HOSTPORT", &device.host_port),
        ("NETVAULT_DEV_USER", &device.login_user),
        ("NETVAULT_DEV_PASS", &device.login_password),
        ("NETVAULT_DEV_ENABLE", &device.enable_password),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.clone()))
    .collect()
}

async fn save(
    device: &Device,
    max_config_files: usize,
    ctx: &FetchContext,
    capture: Capture,
) -> Result<(), Failure> {
    let attrs = &device.attributes;
    let payload = capture
        .render(&attrs.line_filter)
        .map_err(|e| (FetchCode::Save, format!("line filter: {}", e)))?;

    let repo = ctx.repository.clone();
    let prefix = ctx.device_prefix(&device.id);
    let changes_only = attrs.changes_only;
    let content_type = attrs.content_type.clone();

    let path = tokio::task::spawn_blocking(move || {
        repo.save_new_config(
            &prefix,
            max_config_files,
            |buf| {
                buf.extend_from_slice(&payload);
                Ok(())
            },
            changes_only,
            &content_type,
        )
    })
    .await
    .map_err(|e| (FetchCode::Save, e.to_string()))?
    .map_err(|e| (FetchCode::Save, e.to_string()))?;

    debug!("{} {}: saved {}", device.model, device.id, path.display());
    Ok(())
}

async fn record_errlog(device: &Device, ctx: &FetchContext, result: &FetchResult) {
    let max_lines = device.attributes.errlog_hist_size;
    if max_lines == 0 {
        return;
    }

    let repo = ctx.repository.clone();
    let prefix = ctx.device_prefix(&device.id);
    let line = result.errlog_line();

    let written = tokio::task::spawn_blocking(move || {
        repo.backend().create_dir_all(prefix.dir())?;
        errlog::append(repo.backend(), &prefix.errlog(), &line, max_lines)
    })
    .await;

    match written {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("{} {}: errlog: {}", device.model, device.id, e),
        Err(e) => warn!("{} {}: errlog: {}", device.model, device.id, e),
    }
}
