//! `docker` / `podman` CLI backend

use std::process::Command;

use serde_json::Value;
use tracing::debug;

use super::{ContainerRuntime, PortBinding};
use crate::errors::{DevportError, Result};

/// Runtime queried through its command-line client
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        DockerCli::new("docker")
    }
}

impl DockerCli {
    /// # Arguments
    /// * `binary` - Client executable, `docker` or `podman` (or a full path)
    pub fn new(binary: impl Into<String>) -> Self {
        DockerCli {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        debug!(binary = %self.binary, ?args, "Querying container runtime");

        let output = Command::new(&self.binary).args(args).output().map_err(|e| {
            DevportError::RuntimeQueryFailed(format!("failed to run {}: {}", self.binary, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DevportError::RuntimeQueryFailed(format!(
                "{} {} exited with {}: {}",
                self.binary,
                args.first().copied().unwrap_or_default(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ContainerRuntime for DockerCli {
    fn list_containers_by_label(&self, key: &str, value: &str) -> Result<Vec<String>> {
        let filter = format!("label={}={}", key, value);
        let stdout = self.run(&["ps", "--filter", &filter, "--format", "{{json .}}"])?;
        parse_ps_output(&stdout)
    }

    fn inspect_port_bindings(&self, container_id: &str) -> Result<Vec<PortBinding>> {
        let stdout = self.run(&["inspect", container_id])?;
        parse_inspect_output(&stdout)
    }
}

/// Container IDs from `ps --format '{{json .}}'` (one JSON object per line)
pub fn parse_ps_output(stdout: &str) -> Result<Vec<String>> {
    let mut ids = Vec::new();

    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let row: Value = serde_json::from_str(line).map_err(|e| {
            DevportError::RuntimeQueryFailed(format!("unexpected ps output line: {}", e))
        })?;

        // docker uses "ID", podman "Id"
        let id = row
            .get("ID")
            .or_else(|| row.get("Id"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                DevportError::RuntimeQueryFailed("ps output row without an ID".to_string())
            })?;
        ids.push(id.to_string());
    }

    Ok(ids)
}

/// Host bindings from `inspect <id>` output
///
/// Reads `NetworkSettings.Ports` of the first object, falling back to
/// `HostConfig.PortBindings` for containers that are not yet running.
pub fn parse_inspect_output(stdout: &str) -> Result<Vec<PortBinding>> {
    let doc: Value = serde_json::from_str(stdout).map_err(|e| {
        DevportError::RuntimeQueryFailed(format!("unexpected inspect output: {}", e))
    })?;

    let container = doc
        .as_array()
        .and_then(|items| items.first())
        .ok_or_else(|| DevportError::RuntimeQueryFailed("inspect returned no objects".to_string()))?;

    let published = container.pointer("/NetworkSettings/Ports");
    let configured = container.pointer("/HostConfig/PortBindings");

    let mut bindings = published.map(bindings_from_port_map).transpose()?.unwrap_or_default();
    if bindings.is_empty() {
        bindings = configured.map(bindings_from_port_map).transpose()?.unwrap_or_default();
    }
    Ok(bindings)
}

fn bindings_from_port_map(ports: &Value) -> Result<Vec<PortBinding>> {
    let map = match ports {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map,
        _ => {
            return Err(DevportError::RuntimeQueryFailed(
                "port map is not an object".to_string(),
            ))
        }
    };

    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort_by_key(|k| container_port_sort_key(k));

    let mut bindings = Vec::new();
    for key in keys {
        // Exposed-but-unpublished ports map to null
        let Some(entries) = map[key.as_str()].as_array() else {
            continue;
        };
        for entry in entries {
            let host_port = entry
                .get("HostPort")
                .and_then(Value::as_str)
                .and_then(|p| p.parse::<u16>().ok())
                .filter(|p| *p != 0);
            let Some(host_port) = host_port else {
                continue;
            };
            let host_ip = entry
                .get("HostIp")
                .and_then(Value::as_str)
                .filter(|ip| !ip.is_empty())
                .map(str::to_string);
            bindings.push(PortBinding {
                container_port: key.clone(),
                host_ip,
                host_port,
            });
        }
    }
    Ok(bindings)
}

fn container_port_sort_key(key: &str) -> (u32, String) {
    let (port, proto) = key.split_once('/').unwrap_or((key, ""));
    (port.parse().unwrap_or(u32::MAX), proto.to_string())
}
