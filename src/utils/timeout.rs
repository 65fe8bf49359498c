//! Shared timeout constants for the connection lifecycle.

use std::time::Duration;

/// Default timeout for connection-level operations
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between keep-alive probes
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// How long a session may stay silent before it is dropped
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Grace period for draining sessions on shutdown
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
