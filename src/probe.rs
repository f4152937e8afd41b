//! Readiness probing for the Dash server.
//!
//! The server takes a moment to bind its port after spawn, so the launcher
//! polls `/` until it answers 200. Transport errors and non-200 statuses are
//! treated identically: not ready yet, try again after the poll interval.

use std::thread;
use std::time::Duration;

use crate::config::LauncherConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

pub struct ReadinessProbe {
    url: String,
    interval: Duration,
    max_attempts: Option<u64>,
}

impl ReadinessProbe {
    pub fn new(config: &LauncherConfig) -> Self {
        Self {
            url: config.health_url(),
            interval: config.poll_interval,
            max_attempts: config.max_probe_attempts,
        }
    }

    /// Block until the server answers 200, or until the attempt bound is
    /// exhausted. With the default unbounded configuration this only returns
    /// `true`.
    pub fn wait_until_ready(&self) -> bool {
        let client = match reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                log::error!("failed to build readiness probe client: {err}");
                return false;
            }
        };
        poll(self.interval, self.max_attempts, || {
            match client.get(&self.url).send() {
                Ok(response) => response.status() == reqwest::StatusCode::OK,
                Err(err) => {
                    log::debug!("server not ready yet: {err}");
                    false
                }
            }
        })
    }
}

/// Retry loop behind `wait_until_ready`, with the check injected so the retry
/// semantics are testable without a server.
fn poll(interval: Duration, max_attempts: Option<u64>, mut check: impl FnMut() -> bool) -> bool {
    let mut attempts: u64 = 0;
    loop {
        if check() {
            return true;
        }
        attempts += 1;
        if max_attempts.is_some_and(|max| attempts >= max) {
            return false;
        }
        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn immediate_success_checks_once() {
        let mut calls = 0;
        let ready = poll(Duration::from_millis(1), None, || {
            calls += 1;
            true
        });
        assert!(ready);
        assert_eq!(calls, 1);
    }

    #[test]
    fn retries_until_first_success() {
        // connection refused three times, then 200 on the fourth attempt
        let mut calls = 0;
        let interval = Duration::from_millis(10);
        let start = Instant::now();
        let ready = poll(interval, None, || {
            calls += 1;
            calls == 4
        });
        assert!(ready);
        assert_eq!(calls, 4);
        // three retry delays elapsed before the fourth attempt
        assert!(start.elapsed() >= interval * 3);
    }

    #[test]
    fn bounded_attempts_give_up() {
        let mut calls = 0;
        let ready = poll(Duration::from_millis(1), Some(5), || {
            calls += 1;
            false
        });
        assert!(!ready);
        assert_eq!(calls, 5);
    }

    #[test]
    fn success_on_last_allowed_attempt() {
        let mut calls = 0;
        let ready = poll(Duration::from_millis(1), Some(3), || {
            calls += 1;
            calls == 3
        });
        assert!(ready);
        assert_eq!(calls, 3);
    }
}
