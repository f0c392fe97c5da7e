//! Expiration sweeper.
//!
//! The one background actor of the service: on a fixed interval it bulk
//! retires every capsule whose unlock time is further in the past than the
//! retention window. The predicate is time-absolute, so a missed tick is
//! caught by the next one and re-running a pass transitions nothing new.
//! This is a privileged maintenance path that goes straight to the store;
//! no per-record authorization applies.

use std::sync::Arc;
use std::time::Duration;

use capsule_core::{CapsuleStore, Clock, StoreError, SystemClock};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Default sweep cadence (hourly). A tunable, not a correctness knob.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Default retention: capsules are retired 30 days after becoming
/// readable.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Minimum sweep interval, to prevent a misconfigured hot loop.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Errors from sweeper construction.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SweeperError {
    /// Invalid configuration.
    #[error("invalid sweeper configuration: {0}")]
    InvalidConfiguration(String),
}

/// Sweeper tuning.
#[derive(Debug, Clone, Copy)]
pub struct SweeperConfig {
    /// Time between passes.
    pub interval: Duration,
    /// How long after its unlock time a capsule stays readable.
    pub retention: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
            retention: DEFAULT_RETENTION,
        }
    }
}

impl SweeperConfig {
    /// Validates the configuration bounds.
    ///
    /// # Errors
    ///
    /// Returns [`SweeperError::InvalidConfiguration`] if the interval is
    /// below [`MIN_SWEEP_INTERVAL`] or the retention is zero.
    pub fn validate(&self) -> Result<(), SweeperError> {
        if self.interval < MIN_SWEEP_INTERVAL {
            return Err(SweeperError::InvalidConfiguration(format!(
                "interval {:?} is below the minimum {MIN_SWEEP_INTERVAL:?}",
                self.interval
            )));
        }
        if self.retention.is_zero() {
            return Err(SweeperError::InvalidConfiguration(
                "retention must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Periodic maintenance task that retires stale capsules.
pub struct Sweeper<S, C = SystemClock> {
    store: Arc<S>,
    config: SweeperConfig,
    clock: C,
}

impl<S: CapsuleStore> Sweeper<S> {
    /// Creates a sweeper on the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`SweeperError::InvalidConfiguration`] for out-of-bounds
    /// config values.
    pub fn new(store: Arc<S>, config: SweeperConfig) -> Result<Self, SweeperError> {
        Self::with_clock(store, config, SystemClock)
    }
}

impl<S: CapsuleStore, C: Clock> Sweeper<S, C> {
    /// Creates a sweeper with an injected clock.
    ///
    /// # Errors
    ///
    /// Returns [`SweeperError::InvalidConfiguration`] for out-of-bounds
    /// config values.
    pub fn with_clock(store: Arc<S>, config: SweeperConfig, clock: C) -> Result<Self, SweeperError> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            clock,
        })
    }

    /// Runs a single pass: retires every unexpired capsule whose unlock
    /// time lies before `now - retention`.
    ///
    /// Returns the number of capsules transitioned.
    ///
    /// # Errors
    ///
    /// Propagates store failures; the caller (the tick loop) just waits
    /// for the next tick rather than retrying within a pass.
    pub fn sweep(&self) -> Result<u64, StoreError> {
        let retention = chrono::Duration::from_std(self.config.retention)
            .unwrap_or_else(|_| chrono::Duration::days(30));
        let threshold = self.clock.now() - retention;

        let transitioned = self.store.expire_older_than(threshold)?;
        if transitioned > 0 {
            info!(count = transitioned, %threshold, "expired capsules");
        } else {
            debug!(%threshold, "sweep pass found nothing to expire");
        }
        Ok(transitioned)
    }

    /// Spawns the recurring sweep loop.
    ///
    /// The returned handle is retained by the host for graceful shutdown:
    /// send `true` on the shutdown channel (or drop the sender) and await
    /// the handle. Ticks are skipped rather than bunched if a pass
    /// overruns the interval, so passes never overlap.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()>
    where
        S: 'static,
        C: 'static,
    {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match self.sweep() {
                            Ok(_) => {}
                            Err(e) => {
                                // The next tick retries the same
                                // time-absolute predicate; nothing is
                                // lost.
                                error!(error = %e, "sweep pass failed");
                            }
                        }
                    }
                    // A closed channel (sender dropped) also stops the
                    // loop.
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("sweeper shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use capsule_core::{Capsule, ManualClock, MemoryCapsuleStore, OwnerId};
    use chrono::{TimeZone, Utc};

    use super::*;

    fn store_with_capsule(unlock_at: chrono::DateTime<Utc>) -> Arc<MemoryCapsuleStore> {
        let store = Arc::new(MemoryCapsuleStore::new());
        let capsule = Capsule::new(
            OwnerId::new("alice"),
            "sealed".to_string(),
            unlock_at,
            unlock_at - chrono::Duration::days(1),
        );
        store.insert(&capsule).unwrap();
        store
    }

    #[test]
    fn config_validation_rejects_hot_loops_and_zero_retention() {
        let config = SweeperConfig {
            interval: Duration::from_millis(1),
            ..SweeperConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SweeperConfig {
            retention: Duration::ZERO,
            ..SweeperConfig::default()
        };
        assert!(config.validate().is_err());

        assert!(SweeperConfig::default().validate().is_ok());
    }

    #[test]
    fn sweep_retires_only_capsules_past_retention() {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(now);

        let store = store_with_capsule(now - chrono::Duration::days(40));
        let fresh = Capsule::new(
            OwnerId::new("alice"),
            "recent".to_string(),
            now - chrono::Duration::days(10),
            now - chrono::Duration::days(11),
        );
        store.insert(&fresh).unwrap();

        let sweeper =
            Sweeper::with_clock(Arc::clone(&store), SweeperConfig::default(), clock).unwrap();
        assert_eq!(sweeper.sweep().unwrap(), 1);
        assert!(!store.fetch(&fresh.id).unwrap().unwrap().is_expired);
    }

    #[test]
    fn sweep_is_idempotent() {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(now);
        let store = store_with_capsule(now - chrono::Duration::days(40));

        let sweeper = Sweeper::with_clock(store, SweeperConfig::default(), clock).unwrap();
        assert_eq!(sweeper.sweep().unwrap(), 1);
        assert_eq!(sweeper.sweep().unwrap(), 0);
    }

    #[test]
    fn missed_passes_are_caught_by_the_next_tick() {
        // The predicate is absolute in time: a capsule that crossed the
        // threshold while no sweep ran is still picked up later.
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(now);
        let store = store_with_capsule(now - chrono::Duration::days(29));

        let sweeper =
            Sweeper::with_clock(Arc::clone(&store), SweeperConfig::default(), clock.clone())
                .unwrap();
        assert_eq!(sweeper.sweep().unwrap(), 0);

        // Several cadences pass without a tick.
        clock.advance(chrono::Duration::days(2));
        assert_eq!(sweeper.sweep().unwrap(), 1);
    }

    #[tokio::test]
    async fn spawned_loop_exits_on_shutdown() {
        let store = Arc::new(MemoryCapsuleStore::new());
        let sweeper = Sweeper::new(
            store,
            SweeperConfig {
                interval: Duration::from_secs(3600),
                ..SweeperConfig::default()
            },
        )
        .unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = sweeper.spawn(shutdown_rx);

        // Shutdown interrupts the wait; the loop never sits out a full
        // interval.
        shutdown_tx.send(true).expect("sweeper dropped receiver");
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not shut down")
            .expect("sweeper task panicked");
    }
}
