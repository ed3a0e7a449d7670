//! # Hostprobe
//!
//! Async inventory collector for remote hosts.
//!
//! Hostprobe connects to a host over whichever management transport works
//! (SSH, WMI or SNMP), works out what kind of system it is talking to, and
//! collects a fixed set of inventory categories: file systems, hardware,
//! shares, applications, local accounts, patches, services, network
//! identity, network interfaces and operating system.
//!
//! ## Features
//!
//! - Async sessions for shell, management-object and counter-polling transports
//! - Credential and transport rotation with a per-host circuit breaker
//! - Elevation prompt handling for shell commands
//! - Pluggable profilers, first match wins
//! - Per-category graceful degradation to template defaults
//! - Optional scrubbing of vendor names, models and markers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hostprobe::{Credential, TargetBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hostprobe::Error> {
//!     let mut target = TargetBuilder::new("192.168.1.10")
//!         .credential(Credential::new("admin").with_secret("secret"))
//!         .scrub(true)
//!         .build()?;
//!
//!     let inventory = target.scan().await?;
//!     println!("{}", inventory.to_json());
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod inventory;
pub mod profiler;
pub mod scrub;
pub mod session;
pub mod target;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

// Re-export main types for convenience
pub use config::{Credential, ScanConfig};
pub use error::Error;
pub use inventory::{Category, CategoryData, Inventory, Record, Value};
pub use profiler::{Family, Profiler, ProfilerDescriptor, ProfilerRegistry};
pub use session::{ConnectFailure, Session};
pub use target::{Attempt, Target, TargetBuilder};
pub use transport::{BackendFactory, DefaultBackends, TransportKind};
