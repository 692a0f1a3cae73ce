//! Direct velocity control sessions

mod virtual_stick;

pub use virtual_stick::VirtualStickSession;

/// Engine that will drive a control session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionEngine {
    /// Velocity commands computed by the mission kernel and sent as virtual
    /// stick input
    Kernel,
    /// Missions executed on board by the vehicle's own firmware
    Vendor,
}

impl std::fmt::Display for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionEngine::Kernel => write!(f, "kernel"),
            ExecutionEngine::Vendor => write!(f, "vendor"),
        }
    }
}
