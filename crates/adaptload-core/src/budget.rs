//! Performance budget monitoring.
//!
//! Open-loop diagnostics: samples go in, a per-metric report comes out.
//! Nothing here feeds back into loading decisions, retries, or alerts.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

/// Metrics with a fixed budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// First Contentful Paint
    Fcp,
    /// Largest Contentful Paint
    Lcp,
    /// Time To First Byte
    Ttfb,
    /// First Input Delay
    Fid,
    /// Lazy-load latency of one resource, from fetch start to completion.
    ResourceLoad,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Fcp => "fcp",
            Metric::Lcp => "lcp",
            Metric::Ttfb => "ttfb",
            Metric::Fid => "fid",
            Metric::ResourceLoad => "resource_load",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BUDGET_TABLE
            .iter()
            .map(|b| b.metric)
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown metric: {s}"))
    }
}

/// How retained samples collapse into one observed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Latest,
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub metric: Metric,
    pub budget_ms: u64,
    pub aggregation: Aggregation,
}

pub const BUDGET_TABLE: [Budget; 5] = [
    Budget {
        metric: Metric::Fcp,
        budget_ms: 1800,
        aggregation: Aggregation::Latest,
    },
    Budget {
        metric: Metric::Lcp,
        budget_ms: 2500,
        aggregation: Aggregation::Latest,
    },
    Budget {
        metric: Metric::Ttfb,
        budget_ms: 800,
        aggregation: Aggregation::Latest,
    },
    Budget {
        metric: Metric::Fid,
        budget_ms: 100,
        aggregation: Aggregation::Latest,
    },
    Budget {
        metric: Metric::ResourceLoad,
        budget_ms: 1000,
        aggregation: Aggregation::Mean,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub metric: Metric,
    pub value_ms: f64,
    pub captured_at: DateTime<Utc>,
}

/// One line of the budget report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetReport {
    pub metric: Metric,
    pub observed: Option<f64>,
    pub budget: u64,
    pub over_budget: bool,
    pub samples: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub retention: Duration,
    pub max_samples_per_metric: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            retention: Duration::seconds(300),
            max_samples_per_metric: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    config: MonitorConfig,
    samples: HashMap<Metric, VecDeque<PerformanceSample>>,
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            samples: HashMap::new(),
        }
    }

    pub fn record(&mut self, metric: Metric, value_ms: f64) {
        self.record_at(metric, value_ms, Utc::now());
    }

    /// Append a sample and drop anything outside the retention window or
    /// beyond the per-metric cap. Non-finite or negative values are ignored.
    pub fn record_at(&mut self, metric: Metric, value_ms: f64, captured_at: DateTime<Utc>) {
        if !value_ms.is_finite() || value_ms < 0.0 {
            return;
        }
        let cutoff = captured_at - self.config.retention;
        let cap = self.config.max_samples_per_metric.max(1);

        let buffer = self.samples.entry(metric).or_default();
        buffer.push_back(PerformanceSample {
            metric,
            value_ms,
            captured_at,
        });
        while buffer.front().is_some_and(|s| s.captured_at < cutoff) {
            buffer.pop_front();
        }
        while buffer.len() > cap {
            buffer.pop_front();
        }
    }

    pub fn samples(&self, metric: Metric) -> impl Iterator<Item = &PerformanceSample> {
        self.samples.get(&metric).into_iter().flatten()
    }

    pub fn report(&self) -> Vec<BudgetReport> {
        self.report_at(Utc::now())
    }

    /// Report over the samples still inside the retention window at `now`.
    pub fn report_at(&self, now: DateTime<Utc>) -> Vec<BudgetReport> {
        BUDGET_TABLE.iter().map(|b| self.report_for(b, now)).collect()
    }

    pub fn violations(&self) -> Vec<BudgetReport> {
        self.report().into_iter().filter(|r| r.over_budget).collect()
    }

    fn report_for(&self, budget: &Budget, now: DateTime<Utc>) -> BudgetReport {
        let cutoff = now - self.config.retention;
        let retained: Vec<f64> = self
            .samples(budget.metric)
            .filter(|s| s.captured_at >= cutoff)
            .map(|s| s.value_ms)
            .collect();
        let observed = match budget.aggregation {
            Aggregation::Latest => retained.last().copied(),
            Aggregation::Mean if retained.is_empty() => None,
            Aggregation::Mean => Some(retained.iter().sum::<f64>() / retained.len() as f64),
        };
        BudgetReport {
            metric: budget.metric,
            observed,
            budget: budget.budget_ms,
            over_budget: observed.is_some_and(|v| v > budget.budget_ms as f64),
            samples: retained.len(),
        }
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}
