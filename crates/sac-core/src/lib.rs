pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod types;

pub use cache::DatasetCache;
pub use config::AppConfig;
pub use dataset::{Dataset, ParseReport};
pub use error::SacError;
pub use loader::{DataSource, LoadOutcome, LoaderChain, SourceKind};
pub use types::{CallDuration, CallRecord};
