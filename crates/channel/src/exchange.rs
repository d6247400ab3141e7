//! Reliable request/response over an unreliable transport.
//!
//! The caller's message is sent, then exactly one reply is awaited. Each
//! unanswered attempt doubles the wait before the next send. Replies are
//! not correlated with the attempt that triggered them: a late reply to an
//! earlier send is returned as if it answered the latest one.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use udpfetch_protocol::constants::{
    CLIENT_RECV_BUFFER, DEFAULT_INITIAL_TIMEOUT, DEFAULT_MAX_ATTEMPTS,
};

use crate::error::ChannelError;
use crate::transport::Transport;

/// Timeout and attempt budget for one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait applied to the first attempt.
    pub initial_timeout: Duration,
    /// Total sends allowed, the first one included.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_timeout: DEFAULT_INITIAL_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// Wait applied to the 0-based `attempt`: `initial_timeout * 2^attempt`.
    ///
    /// Growth is uncapped; the product saturates instead of overflowing.
    pub fn timeout_for_attempt(&self, attempt: u32) -> Duration {
        self.initial_timeout
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Sum of every attempt's wait, i.e. the longest an exchange can block.
    pub fn worst_case(&self) -> Duration {
        (0..self.max_attempts)
            .map(|a| self.timeout_for_attempt(a))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// A reply accepted by [`exchange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply text with surrounding whitespace trimmed.
    pub text: String,
    /// Address the reply came from.
    pub from: SocketAddr,
    /// Sends performed before the reply arrived (1 = first try).
    pub attempts: u32,
}

/// Sends `message` to `destination` and waits for one reply.
///
/// Retransmits on timeout, doubling the wait each time, for at most
/// `policy.max_attempts` sends. Returns [`ChannelError::Exhausted`] when the
/// budget runs out; any other I/O failure aborts immediately.
pub async fn exchange<T: Transport + ?Sized>(
    transport: &T,
    message: &[u8],
    destination: SocketAddr,
    policy: &RetryPolicy,
) -> Result<Reply, ChannelError> {
    exchange_until(transport, message, destination, policy, Some).await
}

/// Like [`exchange`], but every reply goes through `screen` first.
///
/// A reply mapped to `None` is dropped and the current attempt keeps
/// waiting until its own deadline. The message is only sent again once that
/// window has passed, so an ignored reply never shortens the backoff.
pub async fn exchange_until<T, V, F>(
    transport: &T,
    message: &[u8],
    destination: SocketAddr,
    policy: &RetryPolicy,
    mut screen: F,
) -> Result<V, ChannelError>
where
    T: Transport + ?Sized,
    F: FnMut(Reply) -> Option<V>,
{
    let mut buf = vec![0u8; CLIENT_RECV_BUFFER];

    for attempt in 0..policy.max_attempts {
        let timeout = policy.timeout_for_attempt(attempt);
        trace!(
            %destination,
            attempt = attempt + 1,
            max_attempts = policy.max_attempts,
            timeout_ms = timeout.as_millis() as u64,
            "sending request"
        );
        transport.send_to(message, destination).await?;

        let deadline = deadline_after(timeout);
        loop {
            match tokio::time::timeout_at(deadline, transport.recv_from(&mut buf)).await {
                Ok(Ok((n, from))) => {
                    let text = String::from_utf8_lossy(&buf[..n]).trim().to_string();
                    trace!(%from, len = n, "reply received");
                    let reply = Reply {
                        text,
                        from,
                        attempts: attempt + 1,
                    };
                    match screen(reply) {
                        Some(value) => return Ok(value),
                        None => continue,
                    }
                }
                // Some platforms surface ICMP unreachable on the next recv.
                // The peer may still come up, so wait out this attempt.
                Ok(Err(e)) if is_transient(&e) => {
                    trace!(error = %e, "transient receive error");
                    continue;
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    debug!(
                        %destination,
                        attempt = attempt + 1,
                        timeout_ms = timeout.as_millis() as u64,
                        "no reply, retrying with doubled timeout"
                    );
                    break;
                }
            }
        }
    }

    warn!(
        %destination,
        attempts = policy.max_attempts,
        "retry budget exhausted"
    );
    Err(ChannelError::Exhausted {
        attempts: policy.max_attempts,
    })
}

/// Saturating `now + timeout`, since uncapped backoff can outgrow `Instant`.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
    )
}
