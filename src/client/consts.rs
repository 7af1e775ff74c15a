/// Default address of the tutoring backend.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:3000/ws";

/// Reconnect attempts after which the client gives up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Fixed delay between reconnect attempts.
pub const RECONNECT_DELAY_MS: u64 = 3000;

/// Capacity of the outgoing-query and session-event channels.
pub const CHANNEL_CAPACITY: usize = 1024;

pub const AUTHORIZATION_HEADER: &str = "Authorization";
