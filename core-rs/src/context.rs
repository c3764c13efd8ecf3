//! Wires the allocator and reconciler to one port table
//!
//! Both components must share the same store path and the same lease marker;
//! building them here keeps callers from pairing a store with the wrong lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::DevportConfig;
use crate::errors::Result;
use crate::lock::{DirLock, LeaseLock};
use crate::port::{PortAllocator, PortProbe, PortRange, TcpBindProbe};
use crate::runtime::{ContainerRuntime, DockerCli, Reconciler};
use crate::store::{JsonPortStore, PortStore};

pub struct DevportContext {
    ports_file: PathBuf,
    allocator: PortAllocator,
    reconciler: Reconciler,
}

impl DevportContext {
    /// Filesystem-backed context: JSON table, directory lease, TCP bind probe
    /// and the configured container runtime CLI.
    pub fn from_config(config: &DevportConfig) -> Result<Self> {
        let ports_file = config.ports_file()?;
        let runtime = Arc::new(DockerCli::new(config.container_runtime.clone()));
        let mut context = Self::with_parts(
            &ports_file,
            config.port_range()?,
            Arc::new(DirLock::for_resource(&ports_file).with_options(config.lock_options())),
            Arc::new(TcpBindProbe),
            runtime,
        );
        context.reconciler = context
            .reconciler
            .with_label_key(config.workspace_label.clone());
        Ok(context)
    }

    /// Context over an explicit table path with caller-chosen lock, probe and runtime
    pub fn with_parts(
        ports_file: &Path,
        range: PortRange,
        lock: Arc<dyn LeaseLock>,
        probe: Arc<dyn PortProbe>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        let store: Arc<dyn PortStore> = Arc::new(JsonPortStore::new(ports_file));
        DevportContext {
            ports_file: ports_file.to_path_buf(),
            allocator: PortAllocator::new(store.clone(), lock.clone(), probe, range),
            reconciler: Reconciler::new(store, lock, runtime),
        }
    }

    pub fn ports_file(&self) -> &Path {
        &self.ports_file
    }

    pub fn allocator(&self) -> &PortAllocator {
        &self.allocator
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }
}
