pub mod aggregator;
pub mod ranking;

pub use aggregator::StatisticsAggregator;
pub use ranking::{DistributionReport, NumberOrder};
