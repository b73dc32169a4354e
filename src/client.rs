use reqwest::Client;
use tracing::debug;

use crate::cache::QueryCache;
use crate::config::Config;
use crate::security::{SessionStore, TokenRefresher, TokenStore};
use crate::transport::{ApiError, GatewayClient};

/// Entry point for the platform: one gateway per backend, a shared session
/// and a shared query cache.
#[derive(Debug, Clone)]
pub struct IdeasHub {
    pub(crate) primary: GatewayClient,
    pub(crate) interactions: GatewayClient,
    pub(crate) session: SessionStore,
    pub(crate) cache: QueryCache,
}

impl IdeasHub {
    pub fn new(config: &Config, tokens: TokenStore) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("ideas-hub/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Both backends share one credential pair and one cache; refresh
        // always goes to the primary backend.
        let cache = QueryCache::new(config.cache_ttl());
        let refresher = TokenRefresher::new(&config.primary_url, http.clone());
        let primary = GatewayClient::new(
            &config.primary_url,
            http.clone(),
            tokens.clone(),
            refresher.clone(),
        )
        .with_cache(cache.clone());
        let interactions =
            GatewayClient::new(&config.interactions_url, http, tokens.clone(), refresher)
                .with_cache(cache.clone());

        debug!(
            primary = %config.primary_url,
            interactions = %config.interactions_url,
            "ideas hub client initialized"
        );

        Ok(Self {
            primary,
            interactions,
            session: SessionStore::new(tokens),
            cache,
        })
    }

    /// Build a client whose credentials persist in the configured session file.
    pub async fn from_config(config: &Config) -> Result<Self, ApiError> {
        let tokens = TokenStore::load(config.session_path()).await?;
        Self::new(config, tokens)
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn primary(&self) -> &GatewayClient {
        &self.primary
    }

    pub fn interactions(&self) -> &GatewayClient {
        &self.interactions
    }
}
