//! Aggregation, export, and reporting for sac-dashboard.
//!
//! Computes the attendant/sentiment overview, the duration-filtered sentiment
//! counts for a single attendant, plain-text exports, and report rendering.

pub mod aggregations;
pub mod export;
pub mod reports;

pub use aggregations::{
    AggregateRow, AttendantSummary, FilterSelection, FilteredCount, SentimentAggregator,
};
pub use reports::ReportGenerator;
