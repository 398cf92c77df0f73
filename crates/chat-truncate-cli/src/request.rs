use chat_truncate::{
    maybe_truncate, Message, PromptRenderer, ServerParams, TruncateError, TruncationConfig,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// Per-request generation length; falls back to the server default
    #[serde(default, alias = "n_predict")]
    pub max_tokens: Option<i32>,
}

/// Status code and JSON body, shaped like the chat completion endpoint.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

pub fn handle(
    request: ChatRequest,
    params: &ServerParams,
    config: &TruncationConfig,
    renderer: &dyn PromptRenderer,
    verbose: bool,
) -> Response {
    let capacity = params.slot_capacity(request.max_tokens);
    tracing::debug!(
        "Request with {} messages: n_ctx_slot={}, n_predict={}",
        request.messages.len(),
        capacity.n_ctx_slot,
        capacity.n_predict
    );

    match maybe_truncate(request.messages, config, &capacity, renderer) {
        Ok(prepared) => {
            let mut body = json!({
                "messages": prepared.messages,
                "usage": {
                    "prompt_tokens": prepared.prompt_tokens,
                },
                "truncation": {
                    "truncated": prepared.truncation_occurred,
                    "turns_removed": prepared.turns_removed,
                    "exhausted": prepared.exhausted,
                },
            });
            if verbose {
                body["__verbose"] = json!({ "prompt": prepared.prompt });
            }
            Response { status: 200, body }
        }
        Err(e) => {
            tracing::error!("Request rejected: {}", e);
            Response {
                status: 400,
                body: error_body(&e),
            }
        }
    }
}

fn error_body(err: &TruncateError) -> Value {
    let mut error = json!({
        "code": 400,
        "type": err.error_type(),
        "message": err.to_string(),
    });
    if let TruncateError::ContextExceeded {
        n_prompt_tokens,
        n_ctx,
    } = err
    {
        error["n_prompt_tokens"] = json!(n_prompt_tokens);
        error["n_ctx"] = json!(n_ctx);
    }
    json!({ "error": error })
}
