//! Periodic expired-token sweep.
//!
//! # Responsibilities
//! - Wake on a fixed interval
//! - Drop every token record whose expiry has passed
//!
//! Session state is never touched here; the sweep only bounds the token map.

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::auth::authority::TokenAuthority;
use crate::observability::metrics;

pub struct TokenSweeper {
    authority: TokenAuthority,
    interval: Duration,
}

impl TokenSweeper {
    pub fn new(authority: TokenAuthority, interval: Duration) -> Self {
        Self {
            authority,
            interval,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Token sweeper starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can have expired yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Token sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn sweep_once(&self) -> usize {
        let removed = self.authority.sweep();
        if removed > 0 {
            metrics::record_tokens_swept(removed);
            tracing::info!(
                removed,
                remaining = self.authority.len(),
                "Cleaned up expired tokens"
            );
        }
        removed
    }
}
