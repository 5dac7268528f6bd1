//! Classification metrics for one prompt's predictions and their projection
//! onto the run's fixed result schema.

pub mod report;
pub mod schema;

pub use report::{ClassScores, ClassificationReport};
pub use schema::{aggregate, Averages, MetricSummary, SchemaMode};
