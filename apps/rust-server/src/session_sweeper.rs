// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Sweeper
//!
//! Background task that physically removes expired key-value entries.
//!
//! Expiry is already enforced on read: a session or refresh index entry past
//! its deadline behaves as absent. The sweeper only reclaims the rows, so a
//! missed sweep never changes what a request observes.
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::storage::TtlStore;

/// Periodic purge of expired sessions and refresh index entries.
pub struct SessionSweeper {
    kv: TtlStore,
    interval: Duration,
}

impl SessionSweeper {
    pub fn new(kv: TtlStore, interval: Duration) -> Self {
        Self { kv, interval }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Session sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Session sweeper shutting down");
                    return;
                }
            }

            self.sweep_once();
        }
    }

    /// Execute one sweep. Returns the number of purged entries, zero on error.
    pub fn sweep_once(&self) -> usize {
        match self.kv.purge_expired() {
            Ok(0) => {
                debug!("Session sweeper: nothing expired");
                0
            }
            Ok(purged) => {
                info!(purged, "Session sweeper: purged expired entries");
                purged
            }
            Err(e) => {
                warn!(error = %e, "Session sweeper: purge failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::temp_database;

    #[tokio::test]
    async fn sweep_removes_only_expired_entries() {
        let (db, _dir) = temp_database();
        let kv = TtlStore::new(db);
        kv.set("session:old", b"{}", Duration::from_millis(1)).unwrap();
        kv.set("session:live", b"{}", Duration::from_secs(60)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let sweeper = SessionSweeper::new(kv.clone(), Duration::from_secs(60));
        assert_eq!(sweeper.sweep_once(), 1);
        assert_eq!(sweeper.sweep_once(), 0);
        assert!(kv.get("session:live").unwrap().is_some());
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let (db, _dir) = temp_database();
        let sweeper = SessionSweeper::new(TtlStore::new(db), Duration::from_secs(3600));
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(sweeper.run(shutdown.clone()));
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
