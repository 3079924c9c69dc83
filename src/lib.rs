//! Modhost - module acquisition, build, and dynamic-load pipeline
//!
//! Modhost fetches module manifests and their archives over HTTP, merges
//! the class-bearing content of every known module into one loadable
//! bundle, and resolves entry classes out of that bundle at runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Module Host                               │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │   Module    │  │  Manifest   │  │     Artifact Cache      │  │
//! │  │   Handler   │  │   Store     │  │   (downloaded archives) │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!         │                 │                 │
//!         ▼                 ▼                 ▼
//!    ┌─────────┐      ┌───────────┐      ┌────────┐
//!    │ Staging │      │  Bundle   │      │ Loader │
//!    └─────────┘      └───────────┘      └────────┘
//! ```

pub mod config;
pub mod module;

pub use config::{ConfigError, ModhostConfig};
pub use module::{
    Callback, EntryRegistry, ModuleEntry, ModuleError, ModuleHandler, ModuleManifest, Result,
    StagedCallback, Workspace,
};
