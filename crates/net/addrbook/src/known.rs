use std::{
    net::SocketAddr,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// A peer address plus the bookkeeping used to pick dial targets.
///
/// Timestamps are unix seconds and only change when the entry is mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownAddress {
    pub addr: SocketAddr,
    /// Peer that told us about this address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<SocketAddr>,
    pub added_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success: Option<u64>,
    /// Dial attempts since the last success.
    #[serde(default)]
    pub attempts: u32,
}

impl KnownAddress {
    pub(crate) fn new(addr: SocketAddr, src: Option<SocketAddr>, now: u64) -> Self {
        Self {
            addr,
            src,
            added_at: now,
            last_attempt: None,
            last_success: None,
            attempts: 0,
        }
    }

    /// Whether a dial may be attempted at `now` given a minimum spacing.
    pub(crate) fn is_due(&self, now: u64, retry_after_secs: u64) -> bool {
        self.last_attempt
            .is_none_or(|at| now.saturating_sub(at) >= retry_after_secs)
    }

    pub(crate) fn mark_attempt(&mut self, now: u64) {
        self.last_attempt = Some(now);
        self.attempts = self.attempts.saturating_add(1);
    }

    pub(crate) fn mark_good(&mut self, now: u64) {
        self.last_success = Some(now);
        self.attempts = 0;
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
