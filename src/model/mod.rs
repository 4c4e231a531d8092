//! Capability-calling chat model contract
//!
//! The model is an external collaborator. Each agent step goes through
//! [`invoke`], which tries streaming first, falls back to a single completion,
//! and returns `None` when both fail or exceed the invocation timeout.

mod types;

pub use types::{ChatMessage, ChatRequest, ModelChunk, ModelReply, Role, ToolCall, ToolSpec};

use crate::timer::race_with_timeout;
use anyhow::{bail, Result};
use futures::stream::{BoxStream, StreamExt};
use std::time::Duration;
use tracing::{debug, warn};

pub type ChunkStream = BoxStream<'static, Result<ModelChunk>>;

#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    /// Single non-streaming completion
    async fn complete(&self, request: &ChatRequest) -> Result<ModelReply>;

    /// Incremental completion. Models without streaming keep the default.
    async fn stream(&self, _request: &ChatRequest) -> Result<ChunkStream> {
        bail!("streaming not supported")
    }
}

/// Stand-in when no model backend is connected; every turn degrades to the fallback reply
#[derive(Debug, Default, Clone)]
pub struct OfflineModel;

#[async_trait::async_trait]
impl ChatModel for OfflineModel {
    async fn complete(&self, _request: &ChatRequest) -> Result<ModelReply> {
        bail!("no model backend connected")
    }
}

async fn collect_stream(model: &dyn ChatModel, request: &ChatRequest) -> Result<ModelReply> {
    let mut stream = model.stream(request).await?;
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk?);
    }
    Ok(ModelReply::from_chunks(chunks))
}

/// Run one model step with streaming, then non-streaming fallback
///
/// Each attempt gets the full `timeout`. Errors are logged, never returned.
pub async fn invoke(
    model: &dyn ChatModel,
    request: &ChatRequest,
    timeout: Duration,
) -> Option<ModelReply> {
    match race_with_timeout(timeout, collect_stream(model, request)).await {
        Some(Ok(reply)) => return Some(reply),
        Some(Err(e)) => debug!("Streaming model call failed, falling back: {:#}", e),
        None => warn!("Streaming model call timed out after {}ms", timeout.as_millis()),
    }

    match race_with_timeout(timeout, model.complete(request)).await {
        Some(Ok(reply)) => Some(reply),
        Some(Err(e)) => {
            warn!("Model call failed: {:#}", e);
            None
        }
        None => {
            warn!("Model call timed out after {}ms", timeout.as_millis());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request() -> ChatRequest {
        ChatRequest {
            system: "test".to_string(),
            messages: vec![ChatMessage::user("hi")],
            tools: Vec::new(),
        }
    }

    struct Streaming;

    #[async_trait::async_trait]
    impl ChatModel for Streaming {
        async fn complete(&self, _: &ChatRequest) -> Result<ModelReply> {
            Err(anyhow!("should not be called"))
        }

        async fn stream(&self, _: &ChatRequest) -> Result<ChunkStream> {
            let chunks = vec![
                Ok(ModelChunk::Text { delta: "Hello ".to_string() }),
                Ok(ModelChunk::Text { delta: "there".to_string() }),
            ];
            Ok(stream::iter(chunks).boxed())
        }
    }

    struct BrokenStream {
        completions: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ChatModel for BrokenStream {
        async fn complete(&self, _: &ChatRequest) -> Result<ModelReply> {
            self.completions.fetch_add(1, Ordering::SeqCst);
            Ok(ModelReply {
                text: "fallback".to_string(),
                tool_calls: Vec::new(),
            })
        }

        async fn stream(&self, _: &ChatRequest) -> Result<ChunkStream> {
            let chunks = vec![
                Ok(ModelChunk::Text { delta: "partial".to_string() }),
                Err(anyhow!("connection reset")),
            ];
            Ok(stream::iter(chunks).boxed())
        }
    }

    struct Hanging;

    #[async_trait::async_trait]
    impl ChatModel for Hanging {
        async fn complete(&self, _: &ChatRequest) -> Result<ModelReply> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ModelReply::default())
        }
    }

    #[tokio::test]
    async fn test_streaming_reply_is_assembled() {
        let reply = invoke(&Streaming, &request(), Duration::from_secs(1)).await.unwrap();
        assert_eq!(reply.text, "Hello there");
    }

    #[tokio::test]
    async fn test_broken_stream_falls_back_to_completion() {
        let model = BrokenStream {
            completions: AtomicUsize::new(0),
        };
        let reply = invoke(&model, &request(), Duration::from_secs(1)).await.unwrap();
        assert_eq!(reply.text, "fallback");
        assert_eq!(model.completions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_yields_none() {
        assert!(invoke(&Hanging, &request(), Duration::from_secs(2)).await.is_none());
    }
}
