//! # Netvault
//!
//! Periodic configuration backup for network devices.
//!
//! Netvault logs into routers, switches and hosts over SSH, TELNET, plain
//! TCP or a local helper program, runs each device model's command list
//! and stores the cleaned capture as a numbered snapshot per device.
//!
//! ## Features
//!
//! - Async transports via tokio and russh, with TELNET option handling
//! - Terminal output cleanup (ANSI sequences, CR/BS rewriting)
//! - Model registry with built-in vendor dialogs (Cisco, Juniper, Arista, ...)
//! - Change-only snapshot store with retention and a per-device error log
//! - Scan scheduler with holdtime, bounded concurrency and on-demand fetches
//! - TOML configuration versioned in the same store
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use netvault::{
//!     config, DeviceTable, FetchContext, ModelRegistry, Paths, Repository, Scheduler,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netvault::Error> {
//!     let paths = Paths::from_env();
//!     paths.create_dirs()?;
//!
//!     let repo = Repository::local();
//!     let app = config::load(&repo, &paths.config_prefix)?;
//!     let table = Arc::new(DeviceTable::from_config(ModelRegistry::with_builtin(), app)?);
//!
//!     let scheduler = Scheduler::start(table, FetchContext::new(repo, &paths.repository));
//!     let summary = scheduler.scan().await;
//!     println!("{}", summary);
//!
//!     scheduler.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod platform;
pub mod scan;
pub mod store;
pub mod table;
pub mod transport;

// Re-export main types for convenience
pub use config::{AppConfig, Change, Options, Paths};
pub use driver::{fetch, FetchCode, FetchContext, FetchResult};
pub use error::{Error, Result};
pub use platform::{Attributes, Model, ModelRegistry};
pub use scan::{ScanSummary, Scheduler};
pub use store::Repository;
pub use table::{Device, DeviceRecord, DeviceTable};
pub use transport::TransportKind;
