pub mod buckets;
pub mod compute;
pub mod definitions;
pub mod status;
pub mod trend;
pub mod types;

pub use buckets::{generate, resolve_cadence, Bucket, Grain, MAX_BUCKETS};
pub use definitions::{definitions, MetricDefinition};
pub use status::{config_as_of, evaluate, resolve_effective};
pub use trend::{Engine, TrendRequest};
pub use types::*;
