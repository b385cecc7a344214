//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use stride_core::Email;
use stride_core::cart::LoadingSet;

use crate::backend::{BackendClient, BackendError};
use crate::config::StorefrontConfig;

/// Shortest time an idle shopper's loading state is kept.
const LOADING_IDLE: Duration = Duration::from_secs(30 * 60);

/// Idle window of the loading cache.
///
/// A line stays loading for at most one backend call, and the call that
/// began it touched the entry. Keeping entries for well over the backend
/// timeout means an entry is never dropped while one of its guards is
/// still held.
fn loading_idle(backend_timeout: Duration) -> Duration {
    LOADING_IDLE.max(backend_timeout.saturating_mul(4))
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the backend client and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: BackendClient,
    loading: Cache<String, LoadingSet>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, BackendError> {
        let backend = BackendClient::new(&config.backend)?;
        Ok(Self::with_backend(config, backend))
    }

    /// Create the state around an existing backend client.
    #[must_use]
    pub fn with_backend(config: StorefrontConfig, backend: BackendClient) -> Self {
        // No capacity bound: a size eviction could drop a set that is in use.
        // Idle expiry alone keeps the cache small.
        let loading = Cache::builder()
            .time_to_idle(loading_idle(config.backend.timeout))
            .build();

        Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                loading,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the commerce backend client.
    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    /// Loading state shared by every request of one shopper.
    pub async fn loading_set(&self, email: &Email) -> LoadingSet {
        self.inner
            .loading
            .get_with(email.as_str().to_string(), async { LoadingSet::new() })
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stride_core::ProductId;
    use stride_core::cart::LineItemKey;

    use super::*;

    fn state() -> AppState {
        let config = StorefrontConfig::from_lookup(|key| match key {
            "STRIDE_BACKEND_URL" => Some("http://127.0.0.1:9".to_string()),
            "STRIDE_BASE_URL" => Some("http://localhost:3000".to_string()),
            _ => None,
        })
        .unwrap();
        AppState::new(config).unwrap()
    }

    #[test]
    fn test_loading_idle_outlasts_backend_timeout() {
        assert_eq!(loading_idle(Duration::from_secs(10)), LOADING_IDLE);

        let slow = Duration::from_secs(3600);
        assert!(loading_idle(slow) > slow);
    }

    #[tokio::test]
    async fn test_loading_set_survives_while_guard_is_held() {
        let state = state();
        let juan = Email::parse("juan@example.ph").unwrap();
        let key = LineItemKey::new(ProductId::new(1), Some("M"));

        let _guard = state.loading_set(&juan).await.try_begin(key.clone()).unwrap();
        state.inner.loading.run_pending_tasks().await;

        assert!(state.loading_set(&juan).await.try_begin(key).is_err());
    }

    #[tokio::test]
    async fn test_loading_set_is_shared_per_shopper() {
        let state = state();
        let juan = Email::parse("juan@example.ph").unwrap();
        let maria = Email::parse("maria@example.ph").unwrap();
        let key = LineItemKey::new(ProductId::new(1), Some("M"));

        let _guard = state.loading_set(&juan).await.try_begin(key.clone()).unwrap();

        assert!(state.loading_set(&juan).await.is_loading(&key));
        assert!(!state.loading_set(&maria).await.is_loading(&key));
    }
}
