//! Per-device fixed-window rate limiting.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
struct Windows {
    by_device: HashMap<String, Window>,
    last_sweep: Instant,
}

/// Counts guest requests per device in fixed windows.
///
/// A limit of 0 disables limiting. Windows that have run out are dropped
/// at most once per window length, so devices that stop calling do not
/// stay in memory.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    /// Allow `max_requests` per `window` for each device.
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(Windows {
                by_device: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// A limiter that admits everything.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Record a request from `device_id`; returns `false` once the device
    /// is over its budget for the current window.
    pub async fn check(&self, device_id: &str) -> bool {
        if self.max_requests == 0 {
            return true;
        }
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if now.duration_since(windows.last_sweep) >= self.window {
            let window = self.window;
            let before = windows.by_device.len();
            windows
                .by_device
                .retain(|_, w| now.duration_since(w.started) < window);
            windows.last_sweep = now;
            let evicted = before - windows.by_device.len();
            if evicted > 0 {
                tracing::trace!(evicted, "dropped expired rate limit windows");
            }
        }

        let entry = windows
            .by_device
            .entry(device_id.to_string())
            .or_insert(Window {
                started: now,
                count: 0,
            });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }

    #[cfg(test)]
    async fn tracked_devices(&self) -> usize {
        self.windows.lock().await.by_device.len()
    }
}
