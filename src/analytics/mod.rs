pub mod allocation;
pub mod kelly;
pub mod metrics;
pub mod odds;
pub mod settlement;

pub use allocation::{allocate, AllocationConfig, AllocationPlan, KellyWeighted};
pub use metrics::{compute_match_metrics, compute_metrics, MatchMetrics, MetricsResult};
pub use odds::{OddsConfig, OddsQuote};
