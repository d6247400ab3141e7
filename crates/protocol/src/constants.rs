use std::time::Duration;

/// Largest payload carried by one chunk reply, in raw bytes.
pub const MAX_CHUNK_SIZE: u64 = 1000;

/// Receive buffer used by requesters.
///
/// A full chunk reply is about 1.4 KB after base64, so this leaves room for
/// long filenames.
pub const CLIENT_RECV_BUFFER: usize = 8192;

/// Receive buffer used by the dispatcher and transfer workers.
pub const SERVER_RECV_BUFFER: usize = 4096;

/// Timeout for the first attempt of a request/response exchange.
pub const DEFAULT_INITIAL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Total sends allowed for one exchange before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// A transfer worker exits when no request arrives for this long.
pub const WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Lowest port tried when allocating data ports from a fixed range.
pub const DATA_PORT_RANGE_LOW: u16 = 50_000;

/// Highest port tried when allocating data ports from a fixed range.
pub const DATA_PORT_RANGE_HIGH: u16 = 51_000;

/// Bind attempts before a range allocation gives up.
pub const DATA_PORT_BIND_ATTEMPTS: u32 = 10;

/// Pause between two range bind attempts.
pub const DATA_PORT_BIND_PAUSE: Duration = Duration::from_millis(50);

/// Lowest port accepted for the control endpoint.
pub const MIN_CONTROL_PORT: u16 = 1024;
