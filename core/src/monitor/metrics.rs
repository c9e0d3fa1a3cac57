//! Metrics monitor
//!
//! Counts events per type, tracks grant throughput, queue depth, and peak
//! utilization per resource, and fires an alert callback when any
//! resource's utilization crosses a configured threshold (evaluated on
//! each snapshot).

use std::collections::BTreeMap;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{EventType, Monitor, MonitorEvent};
use crate::models::snapshot::SystemSnapshot;
use crate::models::ResourceId;

/// Aggregated counters exposed by `MetricsMonitor::get_metrics`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_requests: u64,
    pub granted_requests: u64,
    pub denied_requests: u64,
    pub timed_out_requests: u64,
    pub cancelled_requests: u64,

    /// Grants per second since construction or the last reset
    pub grants_per_second: f64,

    /// Mean pending-queue depth over observed snapshots
    pub average_queue_depth: f64,

    /// Highest utilization seen per resource, in `[0, 1]`
    pub peak_utilization: BTreeMap<ResourceId, f64>,
}

type AlertCallback = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct Counters {
    total_requests: u64,
    granted_requests: u64,
    denied_requests: u64,
    timed_out_requests: u64,
    cancelled_requests: u64,
    queue_depth_sum: f64,
    snapshot_count: u64,
    peak_utilization: BTreeMap<ResourceId, f64>,
}

/// Event-counting monitor with a utilization alert hook
pub struct MetricsMonitor {
    counters: Mutex<Counters>,
    started_at: Mutex<Instant>,
    alert: Mutex<Option<(f64, AlertCallback)>>,
}

impl MetricsMonitor {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            started_at: Mutex::new(Instant::now()),
            alert: Mutex::new(None),
        }
    }

    /// Current aggregated metrics
    pub fn get_metrics(&self) -> Metrics {
        let counters = self.counters.lock();
        let elapsed = self.started_at.lock().elapsed().as_secs_f64();
        Metrics {
            total_requests: counters.total_requests,
            granted_requests: counters.granted_requests,
            denied_requests: counters.denied_requests,
            timed_out_requests: counters.timed_out_requests,
            cancelled_requests: counters.cancelled_requests,
            grants_per_second: if elapsed > 0.0 {
                counters.granted_requests as f64 / elapsed
            } else {
                0.0
            },
            average_queue_depth: if counters.snapshot_count > 0 {
                counters.queue_depth_sum / counters.snapshot_count as f64
            } else {
                0.0
            },
            peak_utilization: counters.peak_utilization.clone(),
        }
    }

    /// Zero all counters and restart the throughput clock
    pub fn reset_metrics(&self) {
        *self.counters.lock() = Counters::default();
        *self.started_at.lock() = Instant::now();
    }

    /// Fire `callback` whenever a snapshot shows a resource's utilization
    /// at or above `threshold`
    pub fn set_utilization_alert_threshold(
        &self,
        threshold: f64,
        callback: impl Fn(&str) + Send + Sync + 'static,
    ) {
        *self.alert.lock() = Some((threshold, Box::new(callback)));
    }
}

impl Default for MetricsMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Monitor for MetricsMonitor {
    fn on_event(&self, event: &MonitorEvent) {
        let mut counters = self.counters.lock();
        match event.event_type {
            EventType::RequestSubmitted => counters.total_requests += 1,
            EventType::RequestGranted => counters.granted_requests += 1,
            EventType::RequestDenied => counters.denied_requests += 1,
            EventType::RequestTimedOut => counters.timed_out_requests += 1,
            EventType::RequestCancelled => counters.cancelled_requests += 1,
            _ => {}
        }
    }

    fn on_snapshot(&self, snapshot: &SystemSnapshot) {
        let utilization = snapshot.utilization();
        {
            let mut counters = self.counters.lock();
            counters.snapshot_count += 1;
            counters.queue_depth_sum += snapshot.queue_depth() as f64;
            for (&resource, &used) in &utilization {
                let peak = counters.peak_utilization.entry(resource).or_insert(0.0);
                if used > *peak {
                    *peak = used;
                }
            }
        }

        // Alert outside the counters lock; the callback may be slow.
        let alert = self.alert.lock();
        if let Some((threshold, callback)) = alert.as_ref() {
            for (&resource, &used) in &utilization {
                if used >= *threshold {
                    callback(&format!(
                        "resource {resource} utilization {used:.2} at or above threshold {threshold:.2}"
                    ));
                }
            }
        }
    }
}
