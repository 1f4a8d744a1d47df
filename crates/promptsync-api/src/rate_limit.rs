use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use promptsync_core::util::user_fingerprint;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::error::AppError;

/// Fixed-window limiter keyed by endpoint class and user
#[derive(Clone)]
pub struct EndpointRateLimiter {
    windows: Arc<Mutex<WindowTable>>,
    window: Duration,
    upload: Arc<EndpointBudget>,
    read: Arc<EndpointBudget>,
}

/// Endpoint classes with separate budgets. Download and status share `SyncRead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtectedEndpoint {
    SyncUpload,
    SyncRead,
}

struct EndpointBudget {
    limit: u32,
    allowed: AtomicU64,
    limited: AtomicU64,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct RateLimitMetricsSnapshot {
    pub upload_allowed: u64,
    pub upload_limited: u64,
    pub read_allowed: u64,
    pub read_limited: u64,
}

struct RateWindow {
    opened_at: Instant,
    used: u32,
}

/// Open windows plus the time expired ones were last dropped
struct WindowTable {
    entries: HashMap<(ProtectedEndpoint, String), RateWindow>,
    swept_at: Instant,
}

impl WindowTable {
    fn new(now: Instant) -> Self {
        Self {
            entries: HashMap::new(),
            swept_at: now,
        }
    }

    /// Drops expired windows, at most once per window length
    fn sweep(&mut self, now: Instant, length: Duration) {
        if now.duration_since(self.swept_at) < length {
            return;
        }
        self.entries
            .retain(|_, window| now.duration_since(window.opened_at) < length);
        self.swept_at = now;
    }
}

impl RateWindow {
    /// Counts one request, or returns how long until the window reopens
    fn admit(&mut self, now: Instant, length: Duration, limit: u32) -> Result<(), Duration> {
        let elapsed = now.duration_since(self.opened_at);
        if elapsed >= length {
            self.opened_at = now;
            self.used = 0;
        }
        if self.used >= limit {
            return Err(length.saturating_sub(now.duration_since(self.opened_at)));
        }
        self.used += 1;
        Ok(())
    }
}

impl EndpointBudget {
    const fn new(limit: u32) -> Self {
        Self {
            limit,
            allowed: AtomicU64::new(0),
            limited: AtomicU64::new(0),
        }
    }
}

impl EndpointRateLimiter {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.rate_limit_window,
            config.sync_upload_rate_limit_per_window,
            config.sync_read_rate_limit_per_window,
        )
    }

    fn new(window: Duration, upload_limit: u32, read_limit: u32) -> Self {
        Self {
            windows: Arc::new(Mutex::new(WindowTable::new(Instant::now()))),
            window,
            upload: Arc::new(EndpointBudget::new(upload_limit)),
            read: Arc::new(EndpointBudget::new(read_limit)),
        }
    }

    fn budget(&self, endpoint: ProtectedEndpoint) -> &EndpointBudget {
        match endpoint {
            ProtectedEndpoint::SyncUpload => &self.upload,
            ProtectedEndpoint::SyncRead => &self.read,
        }
    }

    pub async fn check(&self, endpoint: ProtectedEndpoint, user_id: &str) -> Result<(), AppError> {
        let budget = self.budget(endpoint);
        let now = Instant::now();
        let admitted = {
            let mut windows = self.windows.lock().await;
            windows.sweep(now, self.window);
            windows
                .entries
                .entry((endpoint, user_id.to_string()))
                .or_insert(RateWindow {
                    opened_at: now,
                    used: 0,
                })
                .admit(now, self.window, budget.limit)
        };

        match admitted {
            Ok(()) => {
                budget.allowed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(remaining) => {
                budget.limited.fetch_add(1, Ordering::Relaxed);
                // Round up so clients never see `Retry-After: 0`
                let retry_after_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
                let retry_after_secs = retry_after_secs.max(1);
                tracing::warn!(
                    endpoint = endpoint.label(),
                    user = user_fingerprint(user_id),
                    retry_after_secs,
                    "Sync request rejected by rate limiter"
                );
                Err(AppError::too_many_requests(
                    format!("{} budget exhausted", endpoint.label()),
                    retry_after_secs,
                ))
            }
        }
    }

    #[cfg(test)]
    async fn tracked_windows(&self) -> usize {
        self.windows.lock().await.entries.len()
    }

    pub fn metrics_snapshot(&self) -> RateLimitMetricsSnapshot {
        RateLimitMetricsSnapshot {
            upload_allowed: self.upload.allowed.load(Ordering::Relaxed),
            upload_limited: self.upload.limited.load(Ordering::Relaxed),
            read_allowed: self.read.allowed.load(Ordering::Relaxed),
            read_limited: self.read.limited.load(Ordering::Relaxed),
        }
    }
}

impl ProtectedEndpoint {
    pub const fn label(self) -> &'static str {
        match self {
            Self::SyncUpload => "sync_upload",
            Self::SyncRead => "sync_read",
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn upload_budget_is_enforced_per_user() {
        let limiter = EndpointRateLimiter::new(Duration::from_secs(60), 2, 10);

        for _ in 0..2 {
            limiter
                .check(ProtectedEndpoint::SyncUpload, "user-a")
                .await
                .unwrap();
        }
        let err = limiter
            .check(ProtectedEndpoint::SyncUpload, "user-a")
            .await
            .unwrap_err();
        let AppError::TooManyRequests(_, retry_after) = err else {
            panic!("expected 429");
        };
        assert!((1..=60).contains(&retry_after));

        limiter
            .check(ProtectedEndpoint::SyncUpload, "user-b")
            .await
            .unwrap();

        let metrics = limiter.metrics_snapshot();
        assert_eq!(
            (metrics.upload_allowed, metrics.upload_limited),
            (3, 1)
        );
    }

    #[tokio::test]
    async fn read_and_upload_budgets_are_separate() {
        let limiter = EndpointRateLimiter::new(Duration::from_secs(60), 1, 1);

        limiter
            .check(ProtectedEndpoint::SyncUpload, "user-a")
            .await
            .unwrap();
        limiter
            .check(ProtectedEndpoint::SyncRead, "user-a")
            .await
            .unwrap();
        assert!(limiter
            .check(ProtectedEndpoint::SyncRead, "user-a")
            .await
            .is_err());

        let metrics = limiter.metrics_snapshot();
        assert_eq!((metrics.read_allowed, metrics.read_limited), (1, 1));
        assert_eq!(metrics.upload_limited, 0);
    }

    #[test]
    fn expired_windows_are_dropped() {
        let start = Instant::now();
        let length = Duration::from_secs(10);
        let mut table = WindowTable::new(start);
        let open = |opened_at| RateWindow { opened_at, used: 1 };
        table
            .entries
            .insert((ProtectedEndpoint::SyncRead, "user-a".to_string()), open(start));
        table.entries.insert(
            (ProtectedEndpoint::SyncUpload, "user-b".to_string()),
            open(start + Duration::from_secs(6)),
        );

        table.sweep(start + Duration::from_secs(4), length);
        assert_eq!(table.entries.len(), 2);

        table.sweep(start + Duration::from_secs(12), length);
        let kept: Vec<_> = table.entries.keys().map(|(_, user)| user.as_str()).collect();
        assert_eq!(kept, vec!["user-b"]);
    }

    #[tokio::test]
    async fn checks_do_not_retain_idle_users() {
        let limiter = EndpointRateLimiter::new(Duration::ZERO, 5, 5);
        for user in ["user-a", "user-b", "user-c"] {
            limiter
                .check(ProtectedEndpoint::SyncRead, user)
                .await
                .unwrap();
        }
        assert_eq!(limiter.tracked_windows().await, 1);
    }

    #[test]
    fn window_reopens_after_its_length() {
        let start = Instant::now();
        let length = Duration::from_secs(10);
        let mut window = RateWindow {
            opened_at: start,
            used: 0,
        };

        assert!(window.admit(start, length, 1).is_ok());
        let wait = window.admit(start + Duration::from_secs(4), length, 1).unwrap_err();
        assert_eq!(wait, Duration::from_secs(6));
        assert!(window.admit(start + length, length, 1).is_ok());
    }
}
