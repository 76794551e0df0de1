//! Build a WebGL application, ship it to a server, and publish it.
//!
//! `webgl-deploy` drives one app through four steps against one
//! server:
//!
//! 1. **Build** - run the project's build pipeline into the build
//!    folder
//! 2. **Deploy** - mirror the build folder over SFTP to
//!    `/{root}/{user}/{folder}/{app}`, swapping the new tree in only
//!    once it is fully uploaded
//! 3. **Update proxy** - render the nginx site from a template, upload
//!    it, enable it, and reload nginx
//! 4. **Purge cache** - invalidate the build artifact in Cloudflare
//!
//! Settings live in one JSON file (see [`DeploySettings`]) edited from
//! the command line. Each action runs against an immutable snapshot of
//! that file and stops at the first failing step.
//!
//! # Example
//!
//! ```rust,no_run
//! use webgl_deploy::pipeline::{Action, Pipeline};
//! use webgl_deploy::SettingsStore;
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = SettingsStore::new("deploy.json").load().into_settings();
//!
//!     let report = Pipeline::from_settings(settings)?.run(Action::Deploy);
//!     for step in &report.steps {
//!         println!("{}: {:?}", step.step, step.outcome);
//!     }
//!     report.into_result()?;
//!     Ok(())
//! }
//! ```
//!
//! Each remote seam is a trait ([`Connector`](remote::Connector),
//! [`CachePurger`](purge::CachePurger),
//! [`BuildPipeline`](build::BuildPipeline)) so the sequence can run
//! against other backends.

#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod build;
pub mod cli;
pub mod cmd;
pub mod error;
pub mod pipeline;
pub mod proxy;
pub mod purge;
pub mod remote;
pub mod settings;
pub mod ssh;
pub mod transfer;

pub use error::{DeployError, DeployResult};
pub use pipeline::{Action, Pipeline};
pub use purge::Cloudflare;
pub use settings::{DeploySettings, LoadOutcome, ProxyDirective, SettingsStore};
pub use ssh::SshConnector;
