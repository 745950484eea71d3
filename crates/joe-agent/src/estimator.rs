// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wait-event timing estimator.
//!
//! While `EXPLAIN ANALYZE` runs, a second connection samples the executing
//! backend in `pg_stat_activity`. The share of samples spent in read and
//! write IO is scaled by the configured production ratios to estimate how
//! long the query would take on production storage.

use std::sync::Arc;
use std::time::Duration;

use joe_config::model::EstimatorConfig;
use joe_core::types::ConnectionParams;
use joe_core::{ConnectionFactory, SqlConnection};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const SAMPLE_SQL: &str = "select coalesce(wait_event_type, '')::text, coalesce(wait_event, '')::text, coalesce(state, '')::text \
     from pg_stat_activity where pid = $1::int";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSample {
    pub wait_event_type: String,
    pub wait_event: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitClass {
    Cpu,
    Read,
    Write,
    Other,
}

impl WaitSample {
    pub fn class(&self) -> WaitClass {
        if self.wait_event_type.is_empty() {
            return WaitClass::Cpu;
        }
        if self.wait_event_type == "IO" {
            if self.wait_event.contains("Read") {
                return WaitClass::Read;
            }
            if self.wait_event.contains("Write") {
                return WaitClass::Write;
            }
        }
        WaitClass::Other
    }
}

/// A running sampler.
pub struct ProfileHandle {
    stop: CancellationToken,
    task: Option<JoinHandle<Vec<WaitSample>>>,
}

impl ProfileHandle {
    /// Stops sampling and returns the samples taken.
    pub async fn finish(self) -> Vec<WaitSample> {
        self.stop.cancel();
        match self.task {
            Some(task) => task.await.unwrap_or_else(|e| {
                warn!(error = %e, "estimator sampler task failed");
                Vec::new()
            }),
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Estimator {
    config: EstimatorConfig,
}

impl Estimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Opens the sampling connection and starts polling backend `pid`.
    pub async fn start(
        &self,
        connections: &dyn ConnectionFactory,
        params: &ConnectionParams,
        pid: i32,
        cancel: &CancellationToken,
    ) -> ProfileHandle {
        let stop = cancel.child_token();
        let conn = match connections.connect(params).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "cannot open sampling connection, skipping timing estimate");
                return ProfileHandle { stop, task: None };
            }
        };

        let interval = Duration::from_millis(self.config.profiling_interval.max(1));
        let task = tokio::spawn(sample_loop(conn, pid, interval, stop.clone()));
        ProfileHandle {
            stop,
            task: Some(task),
        }
    }

    /// Estimated production time in ms, `None` below the sample threshold.
    pub fn estimate(&self, samples: &[WaitSample], elapsed_ms: f64) -> Option<f64> {
        let threshold = usize::try_from(self.config.sample_threshold).unwrap_or(usize::MAX);
        if samples.is_empty() || samples.len() < threshold {
            debug!(samples = samples.len(), threshold, "not enough samples for an estimate");
            return None;
        }

        let total = samples.len() as f64;
        let share = |class: WaitClass| samples.iter().filter(|s| s.class() == class).count() as f64 / total;
        let read = share(WaitClass::Read);
        let write = share(WaitClass::Write);
        let rest = 1.0 - read - write;

        Some(elapsed_ms * (rest + read * self.config.read_ratio + write * self.config.write_ratio))
    }

    pub fn summary_line(estimate_ms: f64) -> String {
        format!("Estimated timing for production: {estimate_ms:.3} ms")
    }
}

async fn sample_loop(
    conn: Arc<dyn SqlConnection>,
    pid: i32,
    interval: Duration,
    stop: CancellationToken,
) -> Vec<WaitSample> {
    let pid = pid.to_string();
    let mut samples = Vec::new();

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        match conn.query(SAMPLE_SQL, &[&pid]).await {
            Ok(rows) => {
                if let Some(row) = rows.rows.first()
                    && row.get(2).cloned().flatten().as_deref() == Some("active")
                {
                    samples.push(WaitSample {
                        wait_event_type: row.first().cloned().flatten().unwrap_or_default(),
                        wait_event: row.get(1).cloned().flatten().unwrap_or_default(),
                    });
                }
            }
            Err(e) => {
                debug!(error = %e, "estimator sample failed, stopping");
                break;
            }
        }
    }

    conn.close().await;
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(event_type: &str, event: &str) -> WaitSample {
        WaitSample {
            wait_event_type: event_type.into(),
            wait_event: event.into(),
        }
    }

    fn estimator(threshold: u32) -> Estimator {
        Estimator::new(EstimatorConfig {
            read_ratio: 2.0,
            write_ratio: 3.0,
            profiling_interval: 10,
            sample_threshold: threshold,
        })
    }

    #[test]
    fn events_are_classified() {
        assert_eq!(sample("", "").class(), WaitClass::Cpu);
        assert_eq!(sample("IO", "DataFileRead").class(), WaitClass::Read);
        assert_eq!(sample("IO", "WALWrite").class(), WaitClass::Write);
        assert_eq!(sample("Lock", "relation").class(), WaitClass::Other);
    }

    #[test]
    fn estimate_scales_io_shares() {
        // Half CPU, a quarter reads, a quarter writes.
        let samples = vec![
            sample("", ""),
            sample("", ""),
            sample("IO", "DataFileRead"),
            sample("IO", "DataFileWrite"),
        ];
        let estimate = estimator(4).estimate(&samples, 100.0).unwrap();
        assert!((estimate - (50.0 + 25.0 * 2.0 + 25.0 * 3.0)).abs() < 1e-9);
    }

    #[test]
    fn below_threshold_gives_no_estimate() {
        let samples = vec![sample("", ""); 19];
        assert!(estimator(20).estimate(&samples, 10.0).is_none());
        assert!(estimator(1).estimate(&[], 10.0).is_none());
    }

    #[test]
    fn summary_line_format() {
        assert_eq!(
            Estimator::summary_line(12.3456),
            "Estimated timing for production: 12.346 ms"
        );
    }
}
