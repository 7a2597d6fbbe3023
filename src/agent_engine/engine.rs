use std::sync::Arc;

use tokio::sync::Mutex;

use crate::agent_engine::action::{parse_actions, ActionKind, ParsedActions, SheetAction};
use crate::agent_engine::chat::{ChatEntry, ChatLog, ContextLine, Sender};
use crate::agent_engine::event_bus::{EventBus, SessionEvent};
use crate::agent_engine::history::SessionHistory;
use crate::agent_engine::loop_control::LoopController;
use crate::agent_engine::prompts::{action_prompt, playground_block, reasoning_prompt};
use crate::agent_engine::state::{AgentState, TurnOutcome};
use crate::config::AgentConfig;
use crate::errors::{SheetPilotError, SheetPilotResult};
use crate::llm::registry::{ProviderRegistry, ROLE_ACTIONS, ROLE_REASONING};
use crate::llm::types::ChatMessage;
use crate::sheet::access::{check_playground, get_all_content, get_cell, set_cell, summarize};
use crate::sheet::address::is_cell_in_range;
use crate::sheet::cell::CellPatch;
use crate::sheet::host::SpreadsheetHost;

pub const NO_RESPONSE: &str = "[Error: No response from model]";

/// Two-pass agent: a reasoning call writes a plan, an action call turns the
/// plan into a JSON action array, and the array is run against the playground.
pub struct AgentEngine {
    state: AgentState,
    host: Arc<dyn SpreadsheetHost>,
    registry: Arc<Mutex<ProviderRegistry>>,
    events: EventBus,
    history: SessionHistory,
    config: AgentConfig,
}

impl AgentEngine {
    pub fn new(
        host: Arc<dyn SpreadsheetHost>,
        registry: Arc<Mutex<ProviderRegistry>>,
        events: EventBus,
        history: SessionHistory,
        config: AgentConfig,
    ) -> Self {
        Self {
            state: AgentState::Idle,
            host,
            registry,
            events,
            history,
            config,
        }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn host(&self) -> &Arc<dyn SpreadsheetHost> {
        &self.host
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        &self.history.session_id
    }

    /// Handle one user message end to end. Never fails: every problem is
    /// reported into `chat` and reflected in the returned outcome.
    pub async fn process_message(
        &mut self,
        chat: &mut ChatLog,
        message: &str,
        playground: &str,
    ) -> TurnOutcome {
        tracing::info!(playground = %playground, message = %message, "turn started");
        let outcome = self.run_turn(chat, message, playground).await;
        tracing::info!(?outcome, session = %self.history.session_id, "turn finished");
        self.set_state(AgentState::Done {
            outcome: outcome.clone(),
        });
        self.set_state(AgentState::Idle);
        outcome
    }

    async fn run_turn(&mut self, chat: &mut ChatLog, message: &str, playground: &str) -> TurnOutcome {
        if let Err(e) = check_playground(playground, self.config.max_playground_cells) {
            return self.fail(chat, playground, e);
        }
        let mut ctrl = LoopController::new(self.config.max_depth);
        let mut context = chat.context();

        loop {
            if ctrl.should_stop() {
                tracing::warn!(max_depth = ctrl.max_depth(), "depth limit reached");
                self.post(
                    chat,
                    playground,
                    ChatEntry::new(
                        Sender::System,
                        format!("Agent reached maximum recursion depth ({}).", ctrl.max_depth()),
                    ),
                );
                return TurnOutcome::DepthExceeded;
            }

            if ctrl.echoes_task(message) {
                self.post_repeated(chat, playground);
                return TurnOutcome::Repeated;
            }

            let depth = ctrl.depth();
            if depth == 0 {
                self.post(chat, playground, ChatEntry::new(Sender::User, message));
            }

            // ── Reasoning pass ────────────────────────────────────────────
            self.set_state(AgentState::Reasoning { depth });
            let block = playground_block(&get_all_content(self.host.as_ref(), playground).await);
            let prompt = reasoning_prompt(
                playground,
                &block,
                &context,
                message,
                &self.config.extra_conventions,
            );
            let plan = match self.call_role(ROLE_REASONING, prompt).await {
                Ok(plan) => plan,
                Err(e) => return self.fail(chat, playground, e),
            };
            self.post(chat, playground, ChatEntry::new(Sender::Agent, plan.clone()));

            // ── Action pass ───────────────────────────────────────────────
            self.set_state(AgentState::Acting { depth });
            let block = playground_block(&get_all_content(self.host.as_ref(), playground).await);
            let reply = match self.call_role(ROLE_ACTIONS, action_prompt(&plan, &block)).await {
                Ok(reply) => reply,
                Err(e) => return self.fail(chat, playground, e),
            };

            match parse_actions(&reply) {
                ParsedActions::Actions(items) => {
                    return self.execute(chat, playground, items).await;
                }
                ParsedActions::Invalid(err) => {
                    tracing::warn!(error = %err, "action array is not valid JSON");
                    self.post(
                        chat,
                        playground,
                        ChatEntry::new(Sender::System, "Could not parse agent actions as JSON."),
                    );
                    return TurnOutcome::ParseFailed;
                }
                ParsedActions::NoJson => {
                    tracing::info!(depth, reply_len = reply.len(), "no action array; retrying with reply in context");
                    self.post(chat, playground, ChatEntry::new(Sender::Agent, reply.clone()));
                    if !ctrl.record_reply(&reply) {
                        self.post_repeated(chat, playground);
                        return TurnOutcome::Repeated;
                    }
                    context.push(ContextLine {
                        sender: Sender::Agent,
                        text: reply,
                    });
                }
            }
        }
    }

    /// Run a normalized batch in order. Out-of-range and unrecognized entries
    /// are skipped; the first host error abandons the rest.
    async fn execute(
        &mut self,
        chat: &mut ChatLog,
        playground: &str,
        items: Vec<SheetPilotResult<SheetAction>>,
    ) -> TurnOutcome {
        let attempted: Vec<SheetAction> = items.iter().filter_map(|i| i.as_ref().ok().cloned()).collect();
        self.set_state(AgentState::Executing { actions: items.len() });

        let mut executed = 0;
        let mut skipped = 0;
        for item in items {
            let action = match item {
                Ok(action) => action,
                Err(e) => {
                    let detail = match e {
                        SheetPilotError::UnrecognizedAction(raw) => raw,
                        other => other.to_string(),
                    };
                    tracing::warn!(%detail, "skipping unrecognized action");
                    self.post(
                        chat,
                        playground,
                        ChatEntry::new(Sender::System, format!("Skipped unrecognized action: {detail}")),
                    );
                    skipped += 1;
                    continue;
                }
            };

            if !is_cell_in_range(&action.address, playground) {
                tracing::info!(cell = %action.address, "action outside playground skipped");
                self.post(
                    chat,
                    playground,
                    ChatEntry::new(
                        Sender::System,
                        format!("Skipped action for {}: outside playground area.", action.address),
                    ),
                );
                skipped += 1;
                continue;
            }

            if let Err(e) = self.apply(chat, playground, &action).await {
                tracing::error!(error = %e, cell = %action.address, "action failed; abandoning batch");
                let mut entry = ChatEntry::new(Sender::System, format!("Error: {e} (view attempted JSON)"));
                entry.actions = Some(attempted);
                self.post(chat, playground, entry);
                return TurnOutcome::ExecutionAborted { error: e.to_string() };
            }
            executed += 1;
        }

        let mut entry = ChatEntry::new(Sender::System, format!("Executed {executed} actions."));
        entry.actions = Some(attempted);
        self.post(chat, playground, entry);

        let confirmation = match get_all_content(self.host.as_ref(), playground).await {
            Ok(cells) => format!(
                "Task complete: Here is the current state of the playground area after execution:\n{}",
                summarize(&cells)
            ),
            Err(e) => {
                tracing::warn!(error = %e, "confirmation read failed");
                "Task complete, but failed to read playground area for confirmation.".to_string()
            }
        };
        self.post(chat, playground, ChatEntry::new(Sender::Agent, confirmation));

        TurnOutcome::Executed { executed, skipped }
    }

    async fn apply(&self, chat: &mut ChatLog, playground: &str, action: &SheetAction) -> SheetPilotResult<()> {
        let host = self.host.as_ref();
        match action.kind {
            ActionKind::Set => set_cell(host, &action.address, &action.data, playground).await,
            ActionKind::Clear => set_cell(host, &action.address, &CellPatch::cleared(), playground).await,
            ActionKind::Get => {
                let snapshot = get_cell(host, &action.address, playground).await?;
                let json = serde_json::to_string(&snapshot)?;
                self.post(
                    chat,
                    playground,
                    ChatEntry::new(Sender::System, format!("Cell {}: {}", action.address, json)),
                );
                Ok(())
            }
        }
    }

    async fn call_role(&self, role: &str, prompt: String) -> SheetPilotResult<String> {
        let (provider, cfg) = {
            let reg = self.registry.lock().await;
            reg.call_config_for_role(role)?
        };
        tracing::debug!(role, provider = provider.name(), model = %cfg.model, "calling model");
        let response = provider
            .chat(vec![ChatMessage::user(prompt)], &cfg, &self.events)
            .await?;
        if response.content.trim().is_empty() {
            tracing::warn!(role, "model returned no content");
            return Ok(NO_RESPONSE.to_string());
        }
        Ok(response.content)
    }

    fn fail(&self, chat: &mut ChatLog, playground: &str, e: SheetPilotError) -> TurnOutcome {
        tracing::error!(error = %e, "turn failed");
        self.post(chat, playground, ChatEntry::new(Sender::System, format!("Error: {e}")));
        TurnOutcome::Failed { error: e.to_string() }
    }

    fn post_repeated(&self, chat: &mut ChatLog, playground: &str) {
        tracing::warn!("agent repeated itself");
        self.post(
            chat,
            playground,
            ChatEntry::new(Sender::System, "Agent repeated itself. Stopping recursion."),
        );
    }

    fn post(&self, chat: &mut ChatLog, playground: &str, entry: ChatEntry) {
        if let Err(e) = self.history.append(playground, &entry) {
            tracing::warn!(error = %e, "history append failed");
        }
        chat.push(entry.clone());
        self.events.emit(SessionEvent::ChatAppended { entry });
    }

    fn set_state(&mut self, state: AgentState) {
        tracing::debug!(?state, "agent state");
        self.state = state.clone();
        self.events.emit(SessionEvent::StateChanged { state });
    }
}
