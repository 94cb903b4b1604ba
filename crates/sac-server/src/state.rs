use sac_analytics::SentimentAggregator;
use sac_core::cache::DatasetCache;
use sac_core::config::AppConfig;
use sac_core::loader::LoaderChain;
use std::sync::Arc;

/// Shared application state for the server.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub cache: Arc<DatasetCache>,
    pub aggregator: SentimentAggregator,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let chain = LoaderChain::from_config(&config.source);
        Self::with_cache(config, DatasetCache::new(chain))
    }

    pub fn with_cache(config: AppConfig, cache: DatasetCache) -> Self {
        let aggregator = SentimentAggregator::new(config.filter.threshold());
        Self {
            config,
            cache: Arc::new(cache),
            aggregator,
        }
    }
}
