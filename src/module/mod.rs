//! Module acquisition, build, and dynamic-load pipeline.
//!
//! The pipeline lets a host application:
//! - Fetch module manifests (name, artifact URL, version, dependencies)
//! - Download module and dependency archives with staged progress
//! - Merge class-bearing content into one loadable unit
//! - Resolve and instantiate module entry classes at runtime
//! - Remove modules and garbage-collect unreferenced artifacts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  ModuleHandler                       │
//! │  ┌─────────┐  ┌──────────┐  ┌───────────────────┐  │
//! │  │ Acquire │  │ Refresh  │  │  Remove/Resolve   │  │
//! │  └─────────┘  └──────────┘  └───────────────────┘  │
//! └─────────────────────────────────────────────────────┘
//!         │                 │                 │
//!         ▼                 ▼                 ▼
//!    ┌──────────────────────────────────────────┐
//!    │        Transport (HTTP downloads)        │
//!    │     manifest JSON + artifact streams     │
//!    └──────────────────────────────────────────┘
//!         │
//!         ▼
//!    ┌──────────────────────────────────────────┐
//!    │            Workspace Layout              │
//!    │ config | artifacts | staging | bundle    │
//!    └──────────────────────────────────────────┘
//!         │
//!         ▼
//!    ┌──────────────────────────────────────────┐
//!    │        Linker + UnitLoader               │
//!    │  staging tree → bundle.jar → instances   │
//!    └──────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```bash
//! # List known modules
//! modhost list
//!
//! # Add a module from its hosted manifest
//! modhost add https://example.com/modules/demo.json
//!
//! # Re-acquire everything and rebuild the bundle
//! modhost refresh
//!
//! # Remove a module
//! modhost remove demo
//! ```

pub mod cache;
pub mod callback;
pub mod cli;
pub mod error;
pub mod handler;
pub mod linker;
pub mod loader;
pub mod manifest;
pub mod store;
pub mod transport;
pub mod workspace;

pub use cache::{live_keys, ArtifactCache};
pub use callback::{Callback, NoopCallback, StageSlice, StagedCallback};
pub use cli::{execute, ModuleArgs, ModuleCommand};
pub use error::{ModuleError, Result};
pub use handler::ModuleHandler;
pub use linker::{BundleLinker, Linker};
pub use loader::{EntryConstructor, EntryRegistry, ModuleEntry, UnitLoader};
pub use manifest::{Descriptor, ModuleManifest};
pub use store::{ManifestStore, Notifier, TracingNotifier};
pub use transport::{ByteStream, HttpTransport, Transport};
pub use workspace::Workspace;
