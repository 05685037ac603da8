use std::sync::Arc;

/// Default log target for ledger components
pub const DEFAULT_TARGET: &str = "edu_ledger";

/// Log handle injected into the blockchain and wallet constructors
///
/// Every record a component emits goes out under this handle's target, so
/// callers can filter or route per instance without touching the process-wide
/// logger. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telemetry {
    target: Arc<str>,
}

impl Telemetry {
    /// Creates a handle logging under `target`
    pub fn new(target: impl Into<Arc<str>>) -> Self {
        Telemetry {
            target: target.into(),
        }
    }

    /// Derives a handle for a sub-component, e.g. `edu_ledger::wallet`
    pub fn child(&self, name: &str) -> Self {
        Telemetry::new(format!("{}::{}", self.target, name))
    }

    /// The log target used by this handle
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Telemetry::new(DEFAULT_TARGET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_target() {
        let telemetry = Telemetry::new("node-a");
        assert_eq!(telemetry.child("chain").target(), "node-a::chain");
        assert_eq!(Telemetry::default().target(), DEFAULT_TARGET);
    }
}
