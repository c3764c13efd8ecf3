//! Canned runtime answers, for tests and offline use

use std::collections::BTreeMap;

use super::{ContainerRuntime, PortBinding};
use crate::errors::{DevportError, Result};

#[derive(Debug, Clone, Default)]
pub struct FixedRuntime {
    /// label value -> container ids
    containers: BTreeMap<String, Vec<String>>,
    bindings: BTreeMap<String, Vec<PortBinding>>,
    unavailable: bool,
}

impl FixedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runtime whose every query fails, like a missing `docker` binary
    pub fn unavailable() -> Self {
        FixedRuntime {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Register a running container for `label_value` publishing `host_ports`
    /// (container ports are numbered 3000, 3001, ...).
    pub fn with_container(mut self, label_value: &str, id: &str, host_ports: &[u16]) -> Self {
        self.containers
            .entry(label_value.to_string())
            .or_default()
            .push(id.to_string());
        let bindings = host_ports
            .iter()
            .enumerate()
            .map(|(i, port)| PortBinding {
                container_port: format!("{}/tcp", 3000 + i),
                host_ip: Some("0.0.0.0".to_string()),
                host_port: *port,
            })
            .collect();
        self.bindings.insert(id.to_string(), bindings);
        self
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(DevportError::RuntimeQueryFailed(
                "container runtime unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl ContainerRuntime for FixedRuntime {
    fn list_containers_by_label(&self, _key: &str, value: &str) -> Result<Vec<String>> {
        self.check_available()?;
        Ok(self.containers.get(value).cloned().unwrap_or_default())
    }

    fn inspect_port_bindings(&self, container_id: &str) -> Result<Vec<PortBinding>> {
        self.check_available()?;
        self.bindings.get(container_id).cloned().ok_or_else(|| {
            DevportError::RuntimeQueryFailed(format!("no such container: {}", container_id))
        })
    }
}
