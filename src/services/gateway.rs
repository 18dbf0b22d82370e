// src/services/gateway.rs
use crate::config::ApiKey;
use crate::errors::StyleSenseError;
use crate::services::retry::RetryPolicy;
use crate::services::transport::{GenerateRequest, GenerateResponse, ModelTransport};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The piece both request clients share: credential check, then the call.
///
/// Built once at startup with the configuration injected; a missing
/// credential is reported before any network I/O and is never retried.
pub struct ModelGateway {
    transport: Arc<dyn ModelTransport>,
    api_key: Option<ApiKey>,
    retry: RetryPolicy,
}

impl ModelGateway {
    pub fn new(
        transport: Arc<dyn ModelTransport>,
        api_key: Option<ApiKey>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            api_key,
            retry,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn credential(&self) -> Result<&ApiKey, StyleSenseError> {
        self.api_key
            .as_ref()
            .ok_or_else(StyleSenseError::missing_credential)
    }

    /// Credential check, then the transport call retried on rate limits.
    pub async fn call(
        &self,
        request: &GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerateResponse, StyleSenseError> {
        let api_key = self.credential()?;
        let transport = &self.transport;
        self.retry
            .execute(move || transport.generate(api_key, request), cancel)
            .await
    }
}
