use std::collections::HashMap;

use crate::data::{DataSet, Entity, Statistic};
use crate::error::EngineError;

/// A pluggable derived scalar. All extraction is pure and total over the
/// valid day range `[0, num_days)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    Cumulative(Statistic),
    Delta(Statistic),
}

impl Metric {
    pub fn description(self) -> &'static str {
        match self {
            Self::Cumulative(Statistic::Cases) => "Cumulative number of confirmed cases",
            Self::Cumulative(Statistic::Deaths) => "Cumulative number of deaths",
            Self::Delta(Statistic::Cases) => "New cases per day",
            Self::Delta(Statistic::Deaths) => "New deaths per day",
        }
    }

    pub fn pluralize(self, count: u64) -> &'static str {
        let singular = count == 1;
        match self {
            Self::Cumulative(Statistic::Cases) => {
                if singular { "case" } else { "cases" }
            }
            Self::Cumulative(Statistic::Deaths) => {
                if singular { "death" } else { "deaths" }
            }
            Self::Delta(Statistic::Cases) => {
                if singular { "new case" } else { "new cases" }
            }
            Self::Delta(Statistic::Deaths) => {
                if singular { "new death" } else { "new deaths" }
            }
        }
    }

    pub fn total_at(self, data: &DataSet, day: usize) -> u64 {
        match self {
            Self::Cumulative(stat) => data.totals(stat)[day],
            Self::Delta(stat) => delta_at(data.totals(stat), day),
        }
    }

    /// Global maximum across all days, used for scale normalization.
    pub fn max_over_series(self, data: &DataSet) -> u64 {
        let series = match self {
            Self::Cumulative(stat) | Self::Delta(stat) => data.totals(stat),
        };

        match self {
            Self::Cumulative(_) => series.iter().copied().max().unwrap_or(0),
            Self::Delta(_) => (0..series.len())
                .map(|day| delta_at(series, day))
                .max()
                .unwrap_or(0),
        }
    }

    pub fn per_entity_at(self, entity: &Entity, day: usize) -> u64 {
        match self {
            Self::Cumulative(stat) => entity.series(stat)[day],
            Self::Delta(stat) => delta_at(entity.series(stat), day),
        }
    }
}

/// Day 0 treats "yesterday" as zero; a data correction that lowers a
/// cumulative series never yields a negative delta.
fn delta_at(series: &[u64], day: usize) -> u64 {
    let yesterday = if day == 0 { 0 } else { series[day - 1] };
    series[day].saturating_sub(yesterday)
}

pub struct MetricRegistry {
    metrics: HashMap<String, Metric>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self {
            metrics: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("cases", Metric::Cumulative(Statistic::Cases));
        registry.register("deaths", Metric::Cumulative(Statistic::Deaths));
        registry.register("delta_cases", Metric::Delta(Statistic::Cases));
        registry.register("delta_deaths", Metric::Delta(Statistic::Deaths));
        registry
    }

    pub fn register(&mut self, key: impl Into<String>, metric: Metric) {
        self.metrics.insert(key.into(), metric);
    }

    pub fn get(&self, key: &str) -> Result<Metric, EngineError> {
        self.metrics
            .get(key)
            .copied()
            .ok_or_else(|| EngineError::UnknownMetric(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.metrics.contains_key(key)
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
