//! The tool-calling turn loop.
//!
//! One user utterance becomes one turn: the model sees the full history and
//! the provider's tool menu, requested tools run in order, and the model is
//! asked again until it answers in plain text. The number of tool rounds is
//! bounded; the last permitted call is made without tools.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::events::SessionEvent;
use crate::executor::ToolExecutor;
use crate::llm::{CompletionRequest, LanguageModel};
use crate::outbound::Outbound;
use crate::session::SessionSettings;
use crate::state::SessionState;
use crate::tools::tool_menu;
use crate::types::{Role, ToolSpec, Turn};

pub const THINKING_STATUS: &str = "Thinking...";
pub const REPLY_STATUS: &str = "Tap the mic to reply...";
const REPHRASE_APOLOGY: &str = "I had trouble understanding that. Can you rephrase?";
const AFTER_TOOLS_APOLOGY: &str = "Done. Anything else?";

/// Drives conversation turns for one session.
pub struct TurnRunner {
    model: Arc<dyn LanguageModel>,
    executor: ToolExecutor,
    outbound: Outbound,
    settings: SessionSettings,
    tools: Vec<ToolSpec>,
}

impl TurnRunner {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        executor: ToolExecutor,
        outbound: Outbound,
        settings: SessionSettings,
        tools: Vec<ToolSpec>,
    ) -> Self {
        Self {
            model,
            executor,
            outbound,
            settings,
            tools,
        }
    }

    pub fn for_session(
        model: Arc<dyn LanguageModel>,
        executor: ToolExecutor,
        outbound: Outbound,
        settings: SessionSettings,
        kind: parley_core::ProviderKind,
        supports_quick_add: bool,
    ) -> Self {
        let tools = tool_menu(kind, supports_quick_add);
        Self::new(model, executor, outbound, settings, tools)
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    /// Process one user utterance end to end and speak the reply.
    pub async fn run_turn(&self, state: &mut SessionState, text: &str) -> String {
        info!(chars = text.len(), "Processing user turn");
        self.outbound.chat(Role::User, text);
        self.outbound
            .emit(SessionEvent::Suggestions { items: Vec::new() });
        self.outbound.status(THINKING_STATUS);

        state.history.push(Turn::user(text));
        let reply = self.resolve(state).await;
        self.outbound.speak(&reply, REPLY_STATUS).await
    }

    /// Run model rounds until a final text answer.
    async fn resolve(&self, state: &mut SessionState) -> String {
        let max_rounds = self.settings.max_tool_rounds;
        let mut round = 0;
        loop {
            let offer_tools = round < max_rounds;
            let result = self
                .model
                .complete(CompletionRequest {
                    history: &state.history,
                    tools: offer_tools.then_some(self.tools.as_slice()),
                    temperature: self.settings.temperature,
                })
                .await;

            let reply = match result {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(round, "Model call failed: {}", e);
                    let apology = if round == 0 {
                        REPHRASE_APOLOGY
                    } else {
                        AFTER_TOOLS_APOLOGY
                    };
                    return apology.to_string();
                }
            };

            if reply.tool_calls.is_empty() || !offer_tools {
                let text = reply.content.unwrap_or_default();
                state.history.push(Turn::assistant(text.clone()));
                return text;
            }

            debug!(round, calls = reply.tool_calls.len(), "Model requested tools");
            state.history.push(Turn::assistant_calls(
                reply.content.clone(),
                reply.tool_calls.clone(),
            ));
            for call in &reply.tool_calls {
                let result = self.executor.run(state, call).await;
                state.history.push(Turn::tool_result(call, result));
            }
            round += 1;
        }
    }
}
