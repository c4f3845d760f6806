pub mod evaluate;
pub mod series;

pub use evaluate::{evaluate, threshold_enabled, MetricDomain, ThresholdPair};
pub use series::{MetricSeries, SeriesError};
