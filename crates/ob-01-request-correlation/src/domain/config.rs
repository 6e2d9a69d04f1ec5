//! Dispatcher configuration.

use shared_types::OperationClass;
use std::collections::HashMap;
use std::time::Duration;

/// Default wait bound for classes without an override.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default bound on stored result bytes per operation.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 256 * 1024;

/// Timeouts and bounds used by `AsyncDispatcher`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Wait bound for classes without an override.
    pub default_timeout: Duration,
    /// Per-class overrides.
    pub class_timeouts: HashMap<OperationClass, Duration>,
    /// Maximum stored payload bytes per operation.
    pub max_result_bytes: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        let class_timeouts = HashMap::from([
            (OperationClass::ExtScanCachedResults, Duration::from_millis(2000)),
            (OperationClass::LinkStats, Duration::from_millis(500)),
            (OperationClass::PeerCapabilityExchange, Duration::from_millis(800)),
        ]);
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            class_timeouts,
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
        }
    }
}

impl DispatchConfig {
    /// Short timeouts for tests.
    pub fn for_testing() -> Self {
        Self {
            default_timeout: Duration::from_millis(200),
            class_timeouts: HashMap::new(),
            max_result_bytes: 4096,
        }
    }

    pub fn timeout_for(&self, class: OperationClass) -> Duration {
        self.class_timeouts
            .get(&class)
            .copied()
            .unwrap_or(self.default_timeout)
    }

    pub fn with_timeout(mut self, class: OperationClass, timeout: Duration) -> Self {
        self.class_timeouts.insert(class, timeout);
        self
    }

    pub fn with_max_result_bytes(mut self, max_result_bytes: usize) -> Self {
        self.max_result_bytes = max_result_bytes;
        self
    }
}
