// src/services/testing.rs
//! Scripted transport for exercising the clients without a network.

use crate::config::ApiKey;
use crate::errors::StyleSenseError;
use crate::services::transport::{
    GenerateRequest, GenerateResponse, ModelTransport, ResponsePart,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn text_response(text: &str) -> GenerateResponse {
    GenerateResponse {
        parts: vec![ResponsePart::Text(text.to_string())],
    }
}

pub fn image_response(mime_type: &str, data: &str) -> GenerateResponse {
    GenerateResponse {
        parts: vec![ResponsePart::InlineData {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        }],
    }
}

/// Replays queued results in order; once the queue is empty every call
/// gets `fallback`.
pub struct MockTransport {
    script: Mutex<VecDeque<Result<GenerateResponse, StyleSenseError>>>,
    fallback: fn() -> Result<GenerateResponse, StyleSenseError>,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockTransport {
    pub fn new(script: Vec<Result<GenerateResponse, StyleSenseError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: || Err(StyleSenseError::Transport("mock script exhausted".into())),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(fallback: fn() -> Result<GenerateResponse, StyleSenseError>) -> Self {
        Self {
            fallback,
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelTransport for MockTransport {
    async fn generate(
        &self,
        _api_key: &ApiKey,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, StyleSenseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(self.fallback)
    }
}

pub fn test_key() -> Option<ApiKey> {
    ApiKey::resolve(Some("test-key".to_string()))
}
