//! Session client for a conversational tutoring endpoint: a persistent
//! WebSocket with bounded reconnect, a JSON wire codec, a speech I/O bridge,
//! a screen-capture frame sampler, and a typed-response renderer, owned
//! together by a [`Session`].

mod client;

pub mod auth;
pub mod capture;
pub mod codec;
pub mod error;
pub mod reveal;
pub mod session;
pub mod speech;

pub use mentor_realtime_types as types;
pub use mentor_realtime_utils as utils;

pub use client::config::Config;
pub use client::{
    connect, connect_with_config, Client, ConnectionState, EventRx, SessionEvent,
    DEFAULT_ENDPOINT, MAX_RECONNECT_ATTEMPTS, RECONNECT_DELAY_MS,
};
pub use error::{MediaError, ProtocolError, SessionError};
pub use session::Session;
