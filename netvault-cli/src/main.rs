//! netvault: periodic configuration backup for network devices.
//!
//! # Usage
//!
//! ```bash
//! # import devices, one text-form record per line
//! echo "cisco-ios auto 10.0.0.1 telnet,ssh lab secret enable" | netvault --device-import
//!
//! # one scan, then exit
//! netvault --run-once
//!
//! # scan forever (set RUST_LOG=debug for verbose output)
//! netvault
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use netvault::config::{self, APP_NAME};
use netvault::store::Prefix;
use netvault::{
    Change, DeviceRecord, DeviceTable, FetchContext, ModelRegistry, Paths, Repository, Scheduler,
};

#[derive(Parser, Debug)]
#[command(name = "netvault", version, about = "Network device configuration backup")]
struct Args {
    /// Base directory, overrides $HOME_DIR
    #[arg(long)]
    home: Option<PathBuf>,

    /// Config snapshot prefix
    #[arg(long)]
    config_path_prefix: Option<PathBuf>,

    /// Capture repository directory
    #[arg(long)]
    repository_path: Option<PathBuf>,

    /// Scan once, then exit
    #[arg(long)]
    run_once: bool,

    /// Import text-form device records from stdin, then exit
    #[arg(long)]
    device_import: bool,

    /// Mark devices deleted, then exit
    #[arg(long, value_name = "ID", num_args = 1..)]
    device_delete: Vec<String>,

    /// Remove devices from the table, then exit
    #[arg(long, value_name = "ID", num_args = 1..)]
    device_purge: Vec<String>,

    /// Print the device table in text form, then exit
    #[arg(long)]
    device_list: bool,

    /// Only log warnings and errors to stdout
    #[arg(long)]
    disable_stdout_log: bool,
}

impl Args {
    fn paths(&self) -> Paths {
        let mut paths = match &self.home {
            Some(home) => Paths::new(home),
            None => Paths::from_env(),
        };
        if let Some(prefix) = &self.config_path_prefix {
            paths.config_prefix = prefix.clone();
        }
        if let Some(repository) = &self.repository_path {
            paths.repository = repository.clone();
        }
        paths
    }

    fn administers_devices(&self) -> bool {
        self.device_import
            || self.device_list
            || !self.device_delete.is_empty()
            || !self.device_purge.is_empty()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.disable_stdout_log { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let paths = args.paths();
    paths
        .create_dirs()
        .with_context(|| format!("creating directories under {}", paths.home.display()))?;
    info!("{}: home {}", APP_NAME, paths.home.display());

    let repo = Repository::local();
    let app = config::load(&repo, &paths.config_prefix).context("loading config")?;
    let table = Arc::new(DeviceTable::from_config(ModelRegistry::with_builtin(), app)?);
    table.update_last_success(|device| {
        repo.last_mod_time(&Prefix::for_device(&paths.repository, &device.id))
    });

    if args.administers_devices() {
        return administer(&args, &table, &repo, &paths);
    }

    let scheduler = Scheduler::start(table, FetchContext::new(repo, &paths.repository));

    if args.run_once {
        let summary = scheduler.scan().await;
        scheduler.shutdown().await;
        info!("run once: {}", summary);
        return Ok(());
    }

    tokio::select! {
        _ = scheduler.run_loop() => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("waiting for interrupt: {}", e);
            }
            info!("interrupted, waiting for running fetches");
        }
    }
    scheduler.shutdown().await;
    Ok(())
}

/// Apply the device administration flags and persist the result.
fn administer(args: &Args, table: &DeviceTable, repo: &Repository, paths: &Paths) -> Result<()> {
    let change = Change::now("cli", std::env::var("USER").unwrap_or_default());
    let mut changed = false;

    if args.device_import {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading device records from stdin")?;
        let records = DeviceRecord::parse_all(&text)?;
        let summary = table.import(records, &change)?;
        println!("imported: added={:?} updated={:?}", summary.added, summary.updated);
        changed = true;
    }

    for id in &args.device_delete {
        table.delete_device(id)?;
        changed = true;
    }

    for id in &args.device_purge {
        table.purge_device(id)?;
        changed = true;
    }

    if changed {
        let max_files = table.options().max_config_files;
        config::save(repo, &paths.config_prefix, &table.to_config(), max_files)
            .context("saving config")?;
    }

    if args.device_list {
        for device in table.list_devices() {
            if !device.deleted {
                println!("{}", DeviceRecord::from(&device));
            }
        }
    }

    Ok(())
}
