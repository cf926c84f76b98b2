//! Wall-clock and host resource deltas around a request.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use sysinfo::System;

/// Gap between the two CPU refreshes sysinfo needs to compute usage
const CPU_SAMPLE_INTERVAL: Duration = Duration::from_millis(200);

/// Host-wide CPU and memory usage, both in percent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemUsage {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// Change in host usage between two samples, in percentage points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceVariation {
    pub cpu_usage_variation: f64,
    pub memory_usage_variation: f64,
}

/// Result of [`measure`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub response_time_seconds: f64,
    pub resource_variation: ResourceVariation,
}

pub fn sample_system_usage() -> SystemUsage {
    let mut sys = System::new();
    sys.refresh_cpu();
    std::thread::sleep(CPU_SAMPLE_INTERVAL);
    sys.refresh_cpu();
    let cpus = sys.cpus();
    let cpu_percent = if cpus.is_empty() {
        0.0
    } else {
        let sum: f32 = cpus.iter().map(|c| c.cpu_usage()).sum();
        (sum / cpus.len() as f32).clamp(0.0, 100.0) as f64
    };

    sys.refresh_memory();
    let total = sys.total_memory();
    let memory_percent = if total == 0 {
        0.0
    } else {
        sys.used_memory() as f64 / total as f64 * 100.0
    };

    SystemUsage {
        cpu_percent,
        memory_percent,
    }
}

impl SystemUsage {
    pub fn variation_to(&self, after: &SystemUsage) -> ResourceVariation {
        ResourceVariation {
            cpu_usage_variation: after.cpu_percent - self.cpu_percent,
            memory_usage_variation: after.memory_percent - self.memory_percent,
        }
    }
}

/// Runs `f`, timing it and sampling host usage before and after.
///
/// The response time covers `f` only, not the sampling.
pub fn measure<T>(f: impl FnOnce() -> T) -> (T, Measurement) {
    let before = sample_system_usage();
    let start = Instant::now();
    let value = f();
    let response_time_seconds = start.elapsed().as_secs_f64();
    let after = sample_system_usage();

    (
        value,
        Measurement {
            response_time_seconds,
            resource_variation: before.variation_to(&after),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_in_percent() {
        let usage = sample_system_usage();
        assert!((0.0..=100.0).contains(&usage.cpu_percent));
        assert!((0.0..=100.0).contains(&usage.memory_percent));
    }

    #[test]
    fn test_measure_times_the_call() {
        let (value, measurement) = measure(|| {
            std::thread::sleep(Duration::from_millis(30));
            7
        });
        assert_eq!(value, 7);
        assert!(measurement.response_time_seconds >= 0.03);
        assert!(measurement.resource_variation.cpu_usage_variation.abs() <= 100.0);
    }
}
