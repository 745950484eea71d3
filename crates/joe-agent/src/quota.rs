// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user request quota.
//!
//! The window is fixed: it starts at the first admitted request and refills
//! only once `interval` has fully elapsed.

use chrono::{DateTime, Duration, Utc};
use joe_core::JoeError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub window_start: DateTime<Utc>,
    pub count: u32,
    pub limit: u32,
    pub interval_secs: u64,
}

impl Quota {
    /// A quota whose first request opens a new window.
    pub fn new(limit: u32, interval_secs: u64) -> Self {
        Self {
            window_start: DateTime::<Utc>::default(),
            count: 0,
            limit,
            interval_secs,
        }
    }

    fn interval(&self) -> Duration {
        let secs = i64::try_from(self.interval_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs.min(i64::MAX / 1000))
    }

    /// Charges one request at `now`.
    pub fn request(&mut self, now: DateTime<Utc>) -> Result<(), JoeError> {
        let in_window = now.signed_duration_since(self.window_start) < self.interval();

        if in_window {
            if self.count >= self.limit {
                return Err(JoeError::QuotaExceeded {
                    limit: self.limit,
                    interval_secs: self.interval_secs,
                });
            }
            self.count += 1;
            return Ok(());
        }

        self.window_start = now;
        self.count = 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn admits_up_to_limit_within_interval() {
        let mut quota = Quota::new(10, 60);
        for i in 0..10 {
            quota
                .request(t0() + Duration::seconds(i))
                .unwrap_or_else(|e| panic!("request {i} rejected: {e}"));
        }
        let err = quota.request(t0() + Duration::seconds(30)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "You have reached the limit of requests per 60 seconds (10). Please wait before trying again"
        );
        assert_eq!(quota.count, 10);
    }

    #[test]
    fn window_refills_after_interval() {
        let mut quota = Quota::new(2, 60);
        quota.request(t0()).unwrap();
        quota.request(t0()).unwrap();
        assert!(quota.request(t0() + Duration::seconds(59)).is_err());

        quota.request(t0() + Duration::seconds(60)).unwrap();
        assert_eq!(quota.count, 1);
        assert_eq!(quota.window_start, t0() + Duration::seconds(60));
    }

    #[test]
    fn window_does_not_roll_on_each_request() {
        let mut quota = Quota::new(3, 60);
        quota.request(t0()).unwrap();
        quota.request(t0() + Duration::seconds(50)).unwrap();
        quota.request(t0() + Duration::seconds(55)).unwrap();
        // Only the window start matters, not the most recent request.
        quota.request(t0() + Duration::seconds(61)).unwrap();
        assert_eq!(quota.count, 1);
    }

    #[test]
    fn admitted_never_exceeds_limit() {
        let mut quota = Quota::new(5, 10);
        let admitted = (0..50)
            .filter(|i| quota.request(t0() + Duration::milliseconds(i * 100)).is_ok())
            .count();
        assert_eq!(admitted, 5);
    }
}
