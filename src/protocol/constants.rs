//! Protocol constants

use std::time::Duration;

/// Default port the server binds to
pub const DEFAULT_PORT: u16 = 80;

/// Interval between liveness probes; also the only timeout in the system
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Outbound frames buffered per peer before sends start failing
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 256;

/// Path answered with a plain HTTP liveness response
pub const DEFAULT_HEALTH_PATH: &str = "/health";

/// Upper bound on HTTP request handling, the WebSocket upgrade included
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a closing writer waits to flush the close frame
pub const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(1);

/// Status carried by the confirmation sent to every new peer
pub const CONNECTION_STATUS_CONNECTED: &str = "connected";

/// Status reported by the health endpoint
pub const HEALTH_STATUS_OK: &str = "ok";
