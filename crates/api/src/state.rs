use std::sync::Arc;

use draftline_core::events::bus::EventBus;
use draftline_core::sanitize::Sanitizer;
use draftline_core::DocumentService;
use jsonwebtoken::DecodingKey;

use crate::config::AppConfig;

/// Shared application state, passed to all handlers via Axum's `State` extractor.
/// Wrapped in `Arc` so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    service: DocumentService,
    config: AppConfig,
    decoding_key: DecodingKey,
    output: Sanitizer,
}

impl AppState {
    pub fn new(service: DocumentService, config: AppConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        Self {
            inner: Arc::new(InnerState {
                service,
                config,
                decoding_key,
                output: Sanitizer::output(),
            }),
        }
    }

    pub fn service(&self) -> &DocumentService {
        &self.inner.service
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.inner.decoding_key
    }

    /// Sanitizer applied to every document leaving the API.
    pub fn output(&self) -> &Sanitizer {
        &self.inner.output
    }

    pub fn event_bus(&self) -> &EventBus {
        self.inner.service.events()
    }
}
