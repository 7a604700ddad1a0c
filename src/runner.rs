//! # Runner (orientation)
//!
//! The `Runner` drives one user turn through the airline agents. Each turn:
//!
//! 1. screens the message with the active agent's input guardrails,
//! 2. loops model calls for the active agent, running its tools and following
//!    at most one handoff per model response,
//! 3. stops at the first plain-text reply.
//!
//! All work happens on a copy of the session. The copy is committed only when
//! the turn succeeds, so a tripwire or a failed tool leaves the session exactly
//! as it was.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::agent::{AgentId, AgentRegistry};
use crate::config::{AirlineConfig, DEFAULT_MAX_STEPS};
use crate::context::AirlineContext;
use crate::error::{AgentsError, Result};
use crate::guardrail::GuardrailRunner;
use crate::handoff::{HandoffData, HandoffGraph};
use crate::items::{Message, Role, RunItem};
use crate::model::{ModelProvider, ModelRequest};
use crate::tools::DISPLAY_SEAT_MAP;
use crate::usage::UsageStats;

fn truncate_for_log(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let mut out: String = s.chars().take(max).collect();
        out.push('…');
        out
    } else {
        s.to_string()
    }
}

fn format_messages_for_log(messages: &[Message]) -> String {
    messages
        .iter()
        .enumerate()
        .map(|(idx, m)| {
            let role = match m.role {
                Role::System => "SYSTEM",
                Role::User => "USER",
                Role::Assistant => "ASSISTANT",
                Role::Tool => "TOOL",
            };
            let calls = m
                .tool_calls
                .as_ref()
                .map(|calls| {
                    let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
                    format!(" calls=[{}]", names.join(", "))
                })
                .unwrap_or_default();
            format!("{idx:02} {role:<9} | {}{calls}", truncate_for_log(&m.content, 160))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One conversation: its context, who holds the turn, and what was said.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub context: AirlineContext,
    pub active: AgentId,
    pub history: Vec<Message>,
    pub items: Vec<RunItem>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_context(AirlineContext::new())
    }

    pub fn with_context(context: AirlineContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            context,
            active: AgentId::Triage,
            history: Vec::new(),
            items: Vec::new(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Model calls allowed within one turn.
    pub max_steps: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl From<&AirlineConfig> for RunConfig {
    fn from(config: &AirlineConfig) -> Self {
        Self {
            max_steps: config.max_steps,
        }
    }
}

/// Outcome of a successful turn.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub final_output: String,
    /// Agent holding the conversation when the turn ended.
    pub last_agent: AgentId,
    /// Items produced by this turn only.
    pub items: Vec<RunItem>,
    /// Transfers made during this turn, in order.
    pub handoffs: Vec<HandoffData>,
    pub usage: UsageStats,
}

impl TurnResult {
    /// Whether `display_seat_map` ran, asking the front end for a seat picker.
    pub fn requested_seat_map(&self) -> bool {
        self.items.iter().any(|item| {
            matches!(item, RunItem::ToolOutput(out) if out.output.as_deref() == Some(DISPLAY_SEAT_MAP))
        })
    }
}

pub struct Runner {
    agents: AgentRegistry,
    graph: HandoffGraph,
    provider: Arc<dyn ModelProvider>,
    config: RunConfig,
}

impl Runner {
    pub fn new(agents: AgentRegistry, graph: HandoffGraph, provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            agents,
            graph,
            provider,
            config: RunConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// The standard airline deployment: five agents, classifier guardrails
    /// and the star handoff graph, all on `provider`.
    pub fn airline(config: &AirlineConfig, provider: Arc<dyn ModelProvider>) -> Self {
        Self::new(
            AgentRegistry::airline(config, provider.clone()),
            HandoffGraph::airline_default(),
            provider,
        )
        .with_config(RunConfig::from(config))
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn graph(&self) -> &HandoffGraph {
        &self.graph
    }

    /// Process one user message and commit the result to `session`.
    ///
    /// On any error the session is left untouched.
    pub async fn run_turn(&self, session: &mut Session, input: impl Into<String>) -> Result<TurnResult> {
        let input = input.into();
        let span = info_span!("turn", session = %session.id, agent = %session.active);
        self.run_turn_inner(session, input).instrument(span).await
    }

    async fn run_turn_inner(&self, session: &mut Session, input: String) -> Result<TurnResult> {
        let entry = self.agents.get(session.active)?;
        let checks = GuardrailRunner::check_input(entry.input_guardrails(), &session.history, &input)
            .instrument(info_span!("guardrails"))
            .await?;

        let mut items: Vec<RunItem> = checks
            .iter()
            .map(|c| RunItem::guardrail(&c.guardrail, c.verdict.decision, &c.verdict.reasoning))
            .collect();
        let mut ctx = session.context.clone();
        let mut history = session.history.clone();
        let mut active = session.active;
        let mut usage = UsageStats::new();
        for check in checks.iter().filter(|c| c.usage.request_count > 0) {
            usage.record(&check.guardrail, check.usage.clone());
        }
        let mut handoffs = Vec::new();

        history.push(Message::user(input.clone()));
        items.push(RunItem::message(active.name(), Role::User, input));

        for step in 1..=self.config.max_steps {
            let agent = self.agents.get(active)?;

            let mut messages = Vec::with_capacity(history.len() + 1);
            messages.push(agent.build_system_message(&ctx));
            messages.extend(history.iter().cloned());

            let mut tools = agent.tool_specs();
            tools.extend(self.graph.tool_specs(active, &self.agents));

            debug!(
                step,
                agent = %active,
                "Model request:\n{}",
                format_messages_for_log(&messages)
            );
            let request = ModelRequest {
                model: agent.config.model.clone(),
                messages,
                tools,
                temperature: agent.config.temperature,
                response_schema: None,
            };
            let (response, call_usage) = self
                .provider
                .complete(request)
                .instrument(info_span!("model", step, agent = %active))
                .await?;
            usage.record(active.name(), call_usage);

            if !response.has_tool_calls() {
                let output = response.content.unwrap_or_default();
                history.push(Message::assistant(output.clone()));
                items.push(RunItem::message(active.name(), Role::Assistant, output.clone()));

                info!(agent = %active, steps = step, usage = %usage.summary(), "Turn complete");
                session.context = ctx;
                session.history = history;
                session.active = active;
                session.items.extend(items.iter().cloned());
                return Ok(TurnResult {
                    final_output: output,
                    last_agent: active,
                    items,
                    handoffs,
                    usage,
                });
            }

            let preamble = response.content.clone().unwrap_or_default();
            if response.has_content() {
                items.push(RunItem::message(active.name(), Role::Assistant, preamble.clone()));
            }
            history.push(Message::assistant_with_tool_calls(
                preamble,
                response.tool_calls.clone(),
            ));

            let mut handed_off: Option<AgentId> = None;
            for call in &response.tool_calls {
                items.push(RunItem::tool_call(active.name(), call));

                if let Some(handoff) = self.graph.resolve_tool(active, &call.name) {
                    let outcome = if handed_off.is_some() {
                        Err("Only the first handoff in a response is followed.".to_string())
                    } else {
                        let target = self.graph.transfer(active, handoff.target, &mut ctx)?;
                        let data = HandoffData {
                            from_agent: active,
                            to_agent: target,
                            reason: handoff_reason(&call.arguments),
                        };
                        items.push(RunItem::handoff(
                            data.from_agent.name(),
                            data.to_agent.name(),
                            data.reason.clone(),
                        ));
                        handoffs.push(data);
                        handed_off = Some(target);
                        Ok(json!({ "assistant": target.name() }).to_string())
                    };
                    record_tool_outcome(&mut history, &mut items, &call.id, outcome);
                    continue;
                }

                let outcome = match agent.find_tool(&call.name) {
                    Some(tool) => {
                        let result = tool
                            .execute(&mut ctx, call.arguments.clone())
                            .instrument(info_span!("tool", tool = %call.name))
                            .await;
                        match result {
                            Ok(output) => Ok(output),
                            Err(err @ AgentsError::ToolArguments { .. }) => {
                                warn!(tool = %call.name, error = %err, "Rejected tool arguments");
                                Err(err.to_string())
                            }
                            Err(err) => {
                                warn!(tool = %call.name, error = %err, "Tool failed; aborting turn");
                                return Err(err);
                            }
                        }
                    }
                    None => {
                        warn!(agent = %active, tool = %call.name, "Model called a tool the agent does not have");
                        Err(format!("{active} has no tool named '{}'", call.name))
                    }
                };
                record_tool_outcome(&mut history, &mut items, &call.id, outcome);
            }

            if let Some(target) = handed_off {
                active = target;
            }
        }

        warn!(max_steps = self.config.max_steps, "Turn exceeded its step budget");
        Err(AgentsError::MaxStepsExceeded {
            max_steps: self.config.max_steps,
        })
    }
}

fn record_tool_outcome(
    history: &mut Vec<Message>,
    items: &mut Vec<RunItem>,
    call_id: &str,
    outcome: std::result::Result<String, String>,
) {
    match outcome {
        Ok(output) => {
            items.push(RunItem::tool_output(call_id, Ok(&output)));
            history.push(Message::tool(output, call_id));
        }
        Err(error) => {
            items.push(RunItem::tool_output(call_id, Err(&error)));
            history.push(Message::tool(format!("Error: {error}"), call_id));
        }
    }
}

/// The optional `reason` argument of a handoff call.
fn handoff_reason(arguments: &Value) -> Option<String> {
    let parsed;
    let object = match arguments {
        Value::String(raw) => {
            parsed = serde_json::from_str::<Value>(raw).ok()?;
            &parsed
        }
        other => other,
    };
    object
        .get("reason")
        .and_then(Value::as_str)
        .map(str::to_string)
}
