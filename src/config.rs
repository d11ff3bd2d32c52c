//! Runtime configuration
//!
//! Timeouts derived from the file configuration, owned by the supervisor.

use std::time::Duration;

use crate::models::config::LspConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Request,
    Initialization,
    Shutdown,
}

impl OperationType {
    pub fn from_method(method: &str) -> Self {
        match method {
            "initialize" => Self::Initialization,
            "shutdown" => Self::Shutdown,
            _ => Self::Request,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub request_timeout: Duration,
    pub init_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from(&LspConfig::default())
    }
}

impl From<&LspConfig> for RuntimeConfig {
    fn from(config: &LspConfig) -> Self {
        Self {
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            init_timeout: Duration::from_millis(config.init_timeout_ms),
            shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
        }
    }
}

impl RuntimeConfig {
    pub fn timeout_for(&self, method: &str) -> Duration {
        match OperationType::from_method(method) {
            OperationType::Request => self.request_timeout,
            OperationType::Initialization => self.init_timeout,
            OperationType::Shutdown => self.shutdown_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_for_method() {
        let config = RuntimeConfig::default();
        assert_eq!(
            config.timeout_for("textDocument/hover"),
            Duration::from_secs(10)
        );
        assert_eq!(config.timeout_for("initialize"), Duration::from_secs(30));
        assert_eq!(config.timeout_for("shutdown"), Duration::from_secs(2));
    }

    #[test]
    fn test_operation_type_parsing() {
        assert_eq!(
            OperationType::from_method("textDocument/completion"),
            OperationType::Request
        );
        assert_eq!(
            OperationType::from_method("initialize"),
            OperationType::Initialization
        );
        assert_eq!(
            OperationType::from_method("shutdown"),
            OperationType::Shutdown
        );
    }
}
