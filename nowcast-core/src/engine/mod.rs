//! Polling engine
//!
//! Owns credential freshness, the poll cadence, the cached snapshot and the
//! fan-out to subscribers. One logical timeline: a tick fully completes
//! (including picking the next delay) before the next one starts, so the
//! failure flag, the cached snapshot and the refresh token are never raced.
//! Subscriber admission from the transport side interleaves freely with the
//! tick loop through the registry's own synchronization.

pub mod registry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::model::PlaybackUpdate;
use crate::spotify::StreamingUpstream;
use crate::store::{TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

pub use registry::{ConnectionId, SubscriberRegistry};

/// Cadence with no subscribers: cheap tick, react promptly to the first one.
pub const IDLE_DELAY: Duration = Duration::from_secs(1);
/// Cadence while the refresh token is known bad, awaiting re-identification.
pub const DEGRADED_DELAY: Duration = Duration::from_secs(5);
/// Fast retry after a 401 so the refreshed token is tried again quickly.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);
/// Normal poll interval with subscribers present and credentials assumed good.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A cached snapshot older than this is not worth handing to a newly
/// joined viewer; they wait for the next poll instead.
pub const CATCH_UP_WINDOW: Duration = Duration::from_secs(10);

/// What a tick is about to do, derived fresh at the top of each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickState {
    /// No subscribers: skip the network call.
    Idle,
    /// Credentials known bad: skip the network call until re-identification.
    Degraded,
    /// Subscribers present, credentials assumed valid: poll.
    Polling,
}

struct CachedUpdate {
    update: PlaybackUpdate,
    at: Instant,
}

pub struct Engine {
    store: Arc<dyn TokenStore>,
    upstream: Arc<dyn StreamingUpstream>,
    registry: SubscriberRegistry,
    authentication_failed: AtomicBool,
    last_update: Mutex<Option<CachedUpdate>>,
}

impl Engine {
    pub fn new(store: Arc<dyn TokenStore>, upstream: Arc<dyn StreamingUpstream>) -> Self {
        Self {
            store,
            upstream,
            registry: SubscriberRegistry::new(),
            authentication_failed: AtomicBool::new(false),
            last_update: Mutex::new(None),
        }
    }

    /// Register a new viewer. If the cached snapshot is still fresh it is
    /// delivered immediately, so a viewer never waits a full poll interval
    /// to see current state.
    pub fn subscribe(&self) -> (ConnectionId, mpsc::UnboundedReceiver<PlaybackUpdate>) {
        let catch_up = {
            let cached = self.last_update.lock();
            cached
                .as_ref()
                .filter(|cached| cached.at.elapsed() < CATCH_UP_WINDOW)
                .map(|cached| cached.update.clone())
        };
        self.registry.admit(catch_up)
    }

    pub fn unsubscribe(&self, connection_id: &str) {
        self.registry.remove(connection_id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub fn authentication_failed(&self) -> bool {
        self.authentication_failed.load(Ordering::Relaxed)
    }

    /// Called when a fresh authorization exchange completes externally.
    /// Persists both tokens; the very next poll re-reads them from the
    /// store, so the new pair takes effect immediately.
    pub async fn set_tokens(&self, access_token: &str, refresh_token: &str) -> Result<()> {
        info!("Re-identifying with the upstream account");
        self.store.set(ACCESS_TOKEN_KEY, access_token).await?;
        self.store.set(REFRESH_TOKEN_KEY, refresh_token).await?;
        self.authentication_failed.store(false, Ordering::Relaxed);
        Ok(())
    }

    /// Exchange the stored refresh token for a new access token and persist
    /// whatever came back. Never raises: on failure the engine enters the
    /// degraded cadence and waits for re-identification.
    pub async fn refresh_access_token(&self) {
        info!("Refreshing upstream access token");
        match self.try_refresh().await {
            Ok(()) => {
                self.authentication_failed.store(false, Ordering::Relaxed);
                info!("Access token refreshed");
            }
            Err(e) => {
                error!(error = %e, "Failed to refresh access token");
                self.authentication_failed.store(true, Ordering::Relaxed);
            }
        }
    }

    async fn try_refresh(&self) -> Result<()> {
        let refresh_token = self
            .store
            .get(REFRESH_TOKEN_KEY)
            .await?
            .ok_or_else(|| Error::Internal("No refresh token in store".to_string()))?;
        let grant = self.upstream.refresh_token(&refresh_token).await?;
        self.store.set(ACCESS_TOKEN_KEY, &grant.access_token).await?;
        if let Some(rotated) = grant.refresh_token {
            self.store.set(REFRESH_TOKEN_KEY, &rotated).await?;
        }
        Ok(())
    }

    fn tick_state(&self) -> TickState {
        self.registry.prune();
        if self.registry.is_empty() {
            TickState::Idle
        } else if self.authentication_failed() {
            TickState::Degraded
        } else {
            TickState::Polling
        }
    }

    /// One poll-decide cycle. Returns the delay until the next tick; all
    /// failures are absorbed here so the schedule never aborts.
    pub async fn tick(&self) -> Duration {
        match self.tick_state() {
            TickState::Idle => IDLE_DELAY,
            TickState::Degraded => DEGRADED_DELAY,
            TickState::Polling => self.poll().await,
        }
    }

    async fn poll(&self) -> Duration {
        let access_token = match self.store.get(ACCESS_TOKEN_KEY).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                // Nothing to poll with; same recovery path as a 401
                self.refresh_access_token().await;
                return RETRY_DELAY;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read access token from store");
                return POLL_INTERVAL;
            }
        };

        match self.upstream.currently_playing(&access_token).await {
            Ok(playing) => {
                let update = PlaybackUpdate::from(playing);
                *self.last_update.lock() = Some(CachedUpdate {
                    update: update.clone(),
                    at: Instant::now(),
                });
                self.registry.broadcast(&update);
                POLL_INTERVAL
            }
            Err(Error::Unauthorized) => {
                self.refresh_access_token().await;
                RETRY_DELAY
            }
            Err(e) => {
                // Transient (network, 5xx, malformed payload): keep cadence,
                // leave credential state alone
                warn!(error = %e, "Failed to fetch currently playing");
                POLL_INTERVAL
            }
        }
    }

    /// Self-rescheduling tick loop: each tick's delay determines exactly
    /// when the next one fires. Stops when the shutdown channel fires, then
    /// closes every subscriber channel (in that order, so no broadcast
    /// races the teardown).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let delay = self.tick().await;
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {
                    info!("Polling engine stopping");
                    break;
                }
            }
        }
        self.registry.shutdown();
    }
}
