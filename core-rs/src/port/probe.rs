//! Live port probe
//!
//! Bind-and-release is racy against processes outside devport: a port can be
//! taken between the probe and the container binding it. The table
//! reservation is what keeps devport's own allocators apart.

use std::collections::BTreeSet;
use std::net::TcpListener;

use tracing::debug;

/// Answers "could something bind this port right now"
pub trait PortProbe: Send + Sync {
    fn is_free(&self, port: u16) -> bool;
}

/// Binds a loopback listener; success means free
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpBindProbe;

impl PortProbe for TcpBindProbe {
    fn is_free(&self, port: u16) -> bool {
        match TcpListener::bind(("127.0.0.1", port)) {
            Ok(_listener) => true,
            Err(e) => {
                debug!(port, error = %e, "Port not bindable");
                false
            }
        }
    }
}

/// Probe with a fixed set of busy ports
#[derive(Debug, Clone, Default)]
pub struct FixedProbe {
    busy: BTreeSet<u16>,
}

impl FixedProbe {
    /// Every port reported free
    pub fn all_free() -> Self {
        Self::default()
    }

    pub fn with_busy<I: IntoIterator<Item = u16>>(busy: I) -> Self {
        FixedProbe {
            busy: busy.into_iter().collect(),
        }
    }
}

impl PortProbe for FixedProbe {
    fn is_free(&self, port: u16) -> bool {
        !self.busy.contains(&port)
    }
}
