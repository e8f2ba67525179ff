//! Presence keepalive
//!
//! ## 概要
//!
//! 接続ごとに ping タスクを 1 つ起動し、`ping_interval` ごとに WebSocket ping を送ります。
//! 応答のない ping が `max_missed_pongs` 回続いた接続は死んだものとみなして close します。
//! 読み込み期限は受信フレーム（pong を含むすべてのフレーム）によって延長されます。
//! 大量に送信しているクライアントの pong は自身のフレームの後ろに並ぶため、
//! pong だけを数えると健全な接続を切断してしまいます。

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};

use thiserror::Error;

use crate::domain::Connection;

pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_MISSED_PONGS: u32 = 3;
/// Shortest ping period the ping task will run with.
pub const MIN_PING_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeepaliveConfigError {
    #[error("ping interval must be at least {min:?} (got {actual:?})")]
    PingIntervalTooShort { min: Duration, actual: Duration },

    #[error("max missed pongs must be at least 1")]
    NoMissedPongsAllowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    pub ping_interval: Duration,
    /// Unanswered pings tolerated before the connection is closed.
    pub max_missed_pongs: u32,
}

impl KeepaliveConfig {
    /// Validated constructor.
    ///
    /// # Errors
    ///
    /// Rejects a ping interval below [`MIN_PING_INTERVAL`] and a zero
    /// `max_missed_pongs`.
    pub fn new(
        ping_interval: Duration,
        max_missed_pongs: u32,
    ) -> Result<Self, KeepaliveConfigError> {
        if ping_interval < MIN_PING_INTERVAL {
            return Err(KeepaliveConfigError::PingIntervalTooShort {
                min: MIN_PING_INTERVAL,
                actual: ping_interval,
            });
        }
        if max_missed_pongs == 0 {
            return Err(KeepaliveConfigError::NoMissedPongsAllowed);
        }
        Ok(Self {
            ping_interval,
            max_missed_pongs,
        })
    }

    /// The configuration the ping task actually runs with. Out-of-range values
    /// built through the public fields are raised to the smallest valid ones.
    pub fn effective(self) -> Self {
        Self {
            ping_interval: self.ping_interval.max(MIN_PING_INTERVAL),
            max_missed_pongs: self.max_missed_pongs.max(1),
        }
    }
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            max_missed_pongs: DEFAULT_MAX_MISSED_PONGS,
        }
    }
}

/// Liveness bookkeeping shared between the inbound listener and the ping task.
#[derive(Debug, Default)]
pub struct Liveness {
    missed: AtomicU32,
}

impl Liveness {
    /// Any frame read from the peer, pong or not, resets the missed count.
    pub fn record_activity(&self) {
        self.missed.store(0, Ordering::Relaxed);
    }

    fn register_ping(&self) {
        self.missed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn missed_pongs(&self) -> u32 {
        self.missed.load(Ordering::Relaxed)
    }
}

/// Spawn the ping task of `connection`. The task ends when the connection closes.
pub fn spawn_keepalive(
    connection: Connection,
    liveness: Arc<Liveness>,
    config: KeepaliveConfig,
) -> JoinHandle<()> {
    let config = config.effective();
    tokio::spawn(async move {
        let mut ticker = interval(config.ping_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 最初の tick は即座に完了するのでスキップ
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = connection.closed() => break,
                _ = ticker.tick() => {}
            }

            let missed = liveness.missed_pongs();
            if missed >= config.max_missed_pongs {
                tracing::warn!(
                    "User '{}' missed {} pong(s), closing connection {}",
                    connection.user_id(),
                    missed,
                    connection.id()
                );
                connection.close();
                break;
            }

            liveness.register_ping();
            if connection.ping().is_err() {
                break;
            }
        }
    })
}
