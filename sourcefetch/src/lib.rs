//! sourcefetch - fetch staged source artifacts from inside a cluster
//!
//! Opens a temporary `kubectl port-forward` to the in-cluster staging
//! service, resolves the artifact URL for a Git repository snapshot or a
//! packaged Helm chart, downloads the archive and extracts it into a fresh
//! local directory. The tunnel is always torn down once it was started.
//!
//! ```no_run
//! use sourcefetch::config::FetchConfig;
//! use sourcefetch::orchestrator::Orchestrator;
//! use sourcefetch::request::{FetchRequest, SourceKind};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let request = FetchRequest::builder(SourceKind::GitRepository, "podinfo")
//!     .revision("main")
//!     .build()?;
//! let orchestrator = Orchestrator::from_config(&FetchConfig::default())?;
//! let outcome = orchestrator.run(&request)?;
//! println!("{}", outcome.staging_dir.display());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod orchestrator;
pub mod request;
pub mod signal;
pub mod source;
pub mod staging;
pub mod tunnel;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
