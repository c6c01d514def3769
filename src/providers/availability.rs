//! Availability tracker
//!
//! Per-provider circuit state with timed recovery:
//!
//! Available → auth failure → disabled until explicit reset
//! Available → rate limit / server error → disabled until now + window → Available
//!
//! `is_available` consults the clock directly, so expiry never depends on the
//! recovery timer having run. Timers are detached tokio tasks holding only a
//! weak reference to the tracker.

use crate::clock::{Clock, SystemClock};
use crate::config::CascadePolicy;
use crate::error::ErrorClass;
use crate::providers::registry::ProviderRegistry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisableReason {
    AuthFailure,
    RateLimited,
    ServerError,
}

impl DisableReason {
    /// Failure classes that disable a provider. Network and timeout failures do not.
    pub fn from_class(class: ErrorClass) -> Option<Self> {
        match class {
            ErrorClass::Auth => Some(DisableReason::AuthFailure),
            ErrorClass::RateLimit => Some(DisableReason::RateLimited),
            ErrorClass::Server => Some(DisableReason::ServerError),
            ErrorClass::Network | ErrorClass::Timeout | ErrorClass::Unclassified => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AvailabilityWindow {
    pub provider: String,
    /// `None` means disabled until an explicit reset
    pub disabled_until: Option<DateTime<Utc>>,
    pub reason: DisableReason,
}

impl AvailabilityWindow {
    pub fn is_permanent(&self) -> bool {
        self.disabled_until.is_none()
    }

    pub fn has_elapsed(&self, now: DateTime<Utc>) -> bool {
        matches!(self.disabled_until, Some(until) if now >= until)
    }
}

struct Slot {
    window: AvailabilityWindow,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl Slot {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct TrackerInner {
    registry: Arc<ProviderRegistry>,
    clock: Arc<dyn Clock>,
    rate_limit_window: Duration,
    server_error_window: Duration,
    slots: Mutex<HashMap<String, Slot>>,
    generation: AtomicU64,
}

impl TrackerInner {
    async fn expire(&self, key: &str, generation: u64) {
        let mut slots = self.slots.lock().await;

        let due = matches!(
            slots.get(key),
            Some(slot) if slot.generation == generation && slot.window.has_elapsed(self.clock.now())
        );
        if !due {
            return;
        }

        slots.remove(key);
        self.registry.release(key);
        info!(provider = %key, "Provider recovered after availability window");
    }
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        for slot in self.slots.get_mut().values_mut() {
            slot.cancel_timer();
        }
    }
}

/// Shared, cloneable handle over per-provider circuit state.
#[derive(Clone)]
pub struct AvailabilityTracker {
    inner: Arc<TrackerInner>,
}

impl AvailabilityTracker {
    pub fn new(registry: Arc<ProviderRegistry>, policy: &CascadePolicy) -> Self {
        Self::with_clock(registry, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(
        registry: Arc<ProviderRegistry>,
        policy: &CascadePolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                registry,
                clock,
                rate_limit_window: policy.rate_limit_window,
                server_error_window: policy.server_error_window,
                slots: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.inner.registry
    }

    /// Open (or replace) the provider's window for a failure of the given class.
    ///
    /// Returns the new window, or `None` when the class does not disable providers.
    pub async fn record_failure(&self, key: &str, class: ErrorClass) -> Option<AvailabilityWindow> {
        let reason = DisableReason::from_class(class)?;

        let duration = match reason {
            DisableReason::AuthFailure => None,
            DisableReason::RateLimited => Some(self.inner.rate_limit_window),
            DisableReason::ServerError => Some(self.inner.server_error_window),
        };

        let now = self.inner.clock.now();
        let window = AvailabilityWindow {
            provider: key.to_string(),
            disabled_until: duration.map(|d| {
                now + chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero())
            }),
            reason,
        };

        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;

        let mut slots = self.inner.slots.lock().await;
        if let Some(mut previous) = slots.remove(key) {
            previous.cancel_timer();
        }

        let timer = duration.map(|d| self.spawn_recovery(key.to_string(), generation, d));

        slots.insert(
            key.to_string(),
            Slot {
                window: window.clone(),
                generation,
                timer,
            },
        );
        self.inner.registry.hold(key);

        warn!(
            provider = %key,
            reason = ?reason,
            until = ?window.disabled_until,
            "Provider disabled"
        );

        Some(window)
    }

    /// A successful call clears any pending window.
    pub async fn record_success(&self, key: &str) {
        let mut slots = self.inner.slots.lock().await;
        if let Some(mut slot) = slots.remove(key) {
            slot.cancel_timer();
            self.inner.registry.release(key);
            debug!(provider = %key, "Availability window cleared by success");
        }
    }

    pub async fn is_available(&self, key: &str) -> bool {
        {
            let mut slots = self.inner.slots.lock().await;

            if let Some(slot) = slots.get_mut(key) {
                if !slot.window.has_elapsed(self.inner.clock.now()) {
                    return false;
                }

                slot.cancel_timer();
                slots.remove(key);
                self.inner.registry.release(key);
            }
        }

        self.inner
            .registry
            .get(key)
            .await
            .map(|p| p.available)
            .unwrap_or(false)
    }

    pub async fn window(&self, key: &str) -> Option<AvailabilityWindow> {
        let slots = self.inner.slots.lock().await;
        slots.get(key).map(|s| s.window.clone())
    }

    pub async fn windows(&self) -> Vec<AvailabilityWindow> {
        let slots = self.inner.slots.lock().await;
        let mut windows: Vec<_> = slots.values().map(|s| s.window.clone()).collect();
        windows.sort_by(|a, b| a.provider.cmp(&b.provider));
        windows
    }

    /// Explicit reset, the only way out of an auth-failure window.
    ///
    /// Returns whether a window was open. The registry hold is lifted either way.
    pub async fn reset(&self, key: &str) -> bool {
        let mut slots = self.inner.slots.lock().await;
        let cleared = match slots.remove(key) {
            Some(mut slot) => {
                slot.cancel_timer();
                true
            }
            None => false,
        };
        self.inner.registry.release(key);

        if cleared {
            info!(provider = %key, "Provider availability reset");
        }
        cleared
    }

    pub async fn reset_all(&self) -> usize {
        let mut slots = self.inner.slots.lock().await;
        let count = slots.len();

        for (_, mut slot) in slots.drain() {
            slot.cancel_timer();
        }
        self.inner.registry.release_all();

        if count > 0 {
            info!(count, "All provider availability windows reset");
        }
        count
    }

    /// Abort every recovery timer. Windows stay in place and still expire lazily.
    pub async fn shutdown(&self) {
        let mut slots = self.inner.slots.lock().await;
        for slot in slots.values_mut() {
            slot.cancel_timer();
        }
    }

    fn spawn_recovery(&self, key: String, generation: u64, after: Duration) -> JoinHandle<()> {
        let weak: Weak<TrackerInner> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(&key, generation).await;
            }
        })
    }
}
