//! Fault-injecting transport for exercising retransmission.
//!
//! Wraps a real UDP socket and silently discards outbound datagrams
//! according to a deterministic [`DropPlan`], so tests reproduce the same
//! loss pattern on every run.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::UdpSocket;
use tracing::trace;

use crate::transport::Transport;

/// Which outbound datagrams to drop. Sends are numbered from 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropPlan {
    /// Drop this many sends before letting anything through.
    pub drop_first: u64,
    /// After the initial drops, also drop every n-th send.
    pub drop_every: Option<u64>,
}

impl DropPlan {
    /// Returns `true` if send number `n` (1-based) should be dropped.
    pub fn drops(&self, n: u64) -> bool {
        if n <= self.drop_first {
            return true;
        }
        match self.drop_every {
            Some(k) if k > 0 => n % k == 0,
            _ => false,
        }
    }
}

/// A UDP socket whose sends are filtered through a [`DropPlan`].
pub struct FaultyTransport {
    inner: UdpSocket,
    plan: DropPlan,
    sent: AtomicU64,
    dropped: AtomicU64,
}

impl FaultyTransport {
    pub fn new(inner: UdpSocket, plan: DropPlan) -> Self {
        Self {
            inner,
            plan,
            sent: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Sends attempted so far, dropped ones included.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Sends discarded by the plan.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Transport for FaultyTransport {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        if self.plan.drops(n) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            trace!(send = n, %target, "fault: datagram dropped");
            return Ok(buf.len());
        }
        self.inner.send_to(buf, target).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}
