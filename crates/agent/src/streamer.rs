//! Drive the model over the assembled input and accumulate its reply.

use std::sync::Arc;

use codeact_core::error::{ConfigurationError, Error, Result};
use codeact_core::event::{AgentEvent, EventBus};
use codeact_core::provider::{LanguageModel, ProviderRequest, StreamChunk};
use codeact_core::tool::{HANDOFF_TOOL_NAME, Tool};
use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace};

/// What the stream left behind: the last fragment and the full text.
#[derive(Debug, Clone, Default)]
pub struct StreamedResponse {
    pub last_chunk: StreamChunk,
    pub text: String,
    pub fragments: usize,
}

/// Stream one model reply, publishing an `AgentStream` event per fragment.
///
/// When the tool set holds a handoff tool, the model is called with only
/// that tool, which requires native tool calling. Otherwise it is a plain
/// chat call with no tools.
pub async fn stream_response(
    model: &LanguageModel,
    mut request: ProviderRequest,
    tools: &[Arc<dyn Tool>],
    events: &EventBus,
    agent_name: &str,
) -> Result<StreamedResponse> {
    request.stream = true;
    request.tools.clear();

    let handoff = tools.iter().find(|t| t.name() == HANDOFF_TOOL_NAME);
    let rx = match handoff {
        Some(tool) => {
            let provider = model.tool_calling().ok_or_else(|| {
                ConfigurationError::ToolCallingUnsupported {
                    provider: model.name().to_string(),
                }
            })?;
            request.tools.push(tool.to_definition());
            debug!(agent = %agent_name, provider = %model.name(), "Streaming with handoff tool");
            provider.stream(request).await?
        }
        None => {
            debug!(agent = %agent_name, provider = %model.name(), "Streaming chat");
            model.provider().stream(request).await?
        }
    };

    let mut stream = ReceiverStream::new(rx);
    let mut response = StreamedResponse::default();

    while let Some(item) = stream.next().await {
        let chunk = item.map_err(Error::Provider)?;
        let delta = chunk.delta().to_string();
        response.text.push_str(&delta);
        response.fragments += 1;
        trace!(agent = %agent_name, bytes = delta.len(), "Fragment received");

        events.publish(AgentEvent::AgentStream {
            delta,
            response: response.text.clone(),
            tool_calls: Vec::new(),
            raw: chunk.raw.clone(),
            current_agent_name: agent_name.to_string(),
        });
        response.last_chunk = chunk;
    }

    debug!(
        agent = %agent_name,
        fragments = response.fragments,
        chars = response.text.len(),
        "Stream complete"
    );
    Ok(response)
}
