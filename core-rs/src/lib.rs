//! # devport - host port reservations for workspace containers
//!
//! Every workspace (one checked-out branch on disk) that runs a long-lived
//! dev container needs a host port nobody else on the machine is using.
//! devport hands those ports out from a configured range, remembers them in a
//! shared JSON table, and later corrects the table if the container runtime
//! bound something else.
//!
//! ## Core Principle
//!
//! **The table is shared, the processes are not**: each `devport` invocation
//! is its own OS process. The only coordination between them is a lease
//! directory next to the table, so every mutation is serialized on the local
//! filesystem.
//!
//! ## Architecture
//!
//! ```text
//!   allocate / release            reconcile / update
//!          │                             │
//!   ┌──────┴───────┐             ┌───────┴──────┐
//!   │ PortAllocator│             │  Reconciler  │──► ContainerRuntime
//!   └──┬───────┬───┘             └───┬──────┬───┘     (docker / podman)
//!      │       │                     │      │
//!   PortProbe  └──── LeaseLock ──────┘      │
//!                    (ports.json.lock)      │
//!                         │                 │
//!                    PortStore (ports.json) ◄┘
//! ```

pub mod config;
pub mod context;
pub mod errors;
pub mod lock;
pub mod logging;
pub mod port;
pub mod runtime;
pub mod store;

pub use config::DevportConfig;
pub use context::DevportContext;
pub use errors::{DevportError, Result};
pub use lock::{DirLock, Lease, LeaseLock, LockOptions, MemoryLock};
pub use port::{FixedProbe, PortAllocator, PortProbe, PortRange, TcpBindProbe};
pub use runtime::{ContainerRuntime, DockerCli, FixedRuntime, PortBinding, ReconcileOutcome, Reconciler};
pub use store::{JsonPortStore, MemoryPortStore, PortAssignment, PortStore, PortTable};

/// Crate version, as reported by the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
