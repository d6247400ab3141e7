//! Datagram channel for udpfetch.
//!
//! [`Transport`] abstracts a message-oriented socket; [`exchange`] turns a
//! single send/receive into a best-effort reliable call with a doubling
//! timeout and a bounded number of attempts.

pub mod error;
pub mod exchange;
pub mod fault;
pub mod transport;

pub use error::ChannelError;
pub use exchange::{Reply, RetryPolicy, exchange, exchange_until};
pub use fault::{DropPlan, FaultyTransport};
pub use transport::Transport;
