//! Container runtime access for port reconciliation
//!
//! The reconciler needs exactly two questions answered by the runtime:
//! which running container carries a workspace label, and which host ports
//! that container publishes. `ContainerRuntime` is that surface; `DockerCli`
//! answers it by shelling out to `docker` or `podman`.

pub mod docker;
pub mod fixed;
pub mod reconciler;

pub use docker::DockerCli;
pub use fixed::FixedRuntime;
pub use reconciler::{ReconcileOutcome, Reconciler};

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Label the devcontainer CLI stamps with the workspace folder
pub const DEFAULT_WORKSPACE_LABEL: &str = "devcontainer.local_folder";

/// One published port mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    /// Container side, e.g. "3000/tcp"
    pub container_port: String,
    pub host_ip: Option<String>,
    pub host_port: u16,
}

pub trait ContainerRuntime: Send + Sync {
    /// IDs of running containers labelled `key=value`
    fn list_containers_by_label(&self, key: &str, value: &str) -> Result<Vec<String>>;

    /// Published bindings of one container, in container-port order
    fn inspect_port_bindings(&self, container_id: &str) -> Result<Vec<PortBinding>>;
}
