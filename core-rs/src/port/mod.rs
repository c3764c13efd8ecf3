/**
 * port module
 * Workspace port allocation and live-port probing
 */

pub mod allocator;
pub mod probe;

pub use allocator::{PortAllocator, PortRange, DEFAULT_PORT_RANGE_END, DEFAULT_PORT_RANGE_START};
pub use probe::{FixedProbe, PortProbe, TcpBindProbe};
