//! # Agent (orientation)
//!
//! An `Agent` is one role in the airline workflow: an identity, an
//! instruction template, a bound model, a tool subset and the input
//! guardrails that screen every message it receives. Agents are immutable once
//! built; who may hand off to whom lives in [`crate::handoff::HandoffGraph`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::AirlineConfig;
use crate::context::AirlineContext;
use crate::error::{AgentsError, Result};
use crate::guardrail::{model_guardrails, InputGuardrail};
use crate::instructions;
use crate::items::Message;
use crate::model::ModelProvider;
use crate::tool::{Tool, ToolSpec};
use crate::tools;

/// The five airline roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgentId {
    Triage,
    SeatBooking,
    FlightStatus,
    Cancellation,
    Faq,
}

impl AgentId {
    pub const LEAVES: [AgentId; 4] = [
        AgentId::SeatBooking,
        AgentId::FlightStatus,
        AgentId::Cancellation,
        AgentId::Faq,
    ];

    pub fn all() -> [AgentId; 5] {
        [
            AgentId::Triage,
            AgentId::SeatBooking,
            AgentId::FlightStatus,
            AgentId::Cancellation,
            AgentId::Faq,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            AgentId::Triage => "Triage Agent",
            AgentId::SeatBooking => "Seat Booking Agent",
            AgentId::FlightStatus => "Flight Status Agent",
            AgentId::Cancellation => "Cancellation Agent",
            AgentId::Faq => "FAQ Agent",
        }
    }

    /// Description other agents see when deciding whether to hand off here.
    pub fn handoff_description(self) -> &'static str {
        match self {
            AgentId::Triage => {
                "A triage agent that can delegate a customer's request to the appropriate agent."
            }
            AgentId::SeatBooking => "A helpful agent that can update a seat on a flight.",
            AgentId::FlightStatus => "An agent to provide flight status information.",
            AgentId::Cancellation => "An agent to cancel flights.",
            AgentId::Faq => "A helpful agent that can answer questions about the airline.",
        }
    }

    pub fn from_name(name: &str) -> Result<AgentId> {
        Self::all()
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| AgentsError::UnknownAgent {
                name: name.to_string(),
            })
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Produces an agent's system prompt.
#[derive(Clone)]
pub enum Instructions {
    Static(String),
    /// Rendered from a snapshot of the session context at each model call.
    Dynamic(fn(&AirlineContext) -> String),
}

impl Instructions {
    pub fn render(&self, ctx: &AirlineContext) -> String {
        match self {
            Instructions::Static(text) => text.clone(),
            Instructions::Dynamic(f) => f(ctx),
        }
    }
}

impl fmt::Debug for Instructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instructions::Static(text) => f.debug_tuple("Static").field(text).finish(),
            Instructions::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for Instructions {
    fn from(text: &str) -> Self {
        Instructions::Static(text.to_string())
    }
}

impl From<String> for Instructions {
    fn from(text: String) -> Self {
        Instructions::Static(text)
    }
}

/// Defines the complete configuration for an [`Agent`].
#[derive(Clone)]
pub struct AgentConfig {
    pub id: AgentId,

    /// Shown to agents that may hand off to this one.
    pub handoff_description: String,

    pub instructions: Instructions,

    /// Model name passed to the provider.
    pub model: String,

    pub temperature: Option<f32>,

    /// Tools only this agent may call.
    pub tools: Vec<Arc<dyn Tool>>,

    /// Screens run on every user message while this agent is active.
    pub input_guardrails: Vec<Arc<dyn InputGuardrail>>,
}

/// A configured airline agent.
#[derive(Clone)]
pub struct Agent {
    pub config: AgentConfig,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// An agent with the given instructions and no tools or guardrails.
    pub fn simple(id: AgentId, instructions: impl Into<Instructions>) -> Self {
        Self::new(AgentConfig {
            id,
            handoff_description: id.handoff_description().to_string(),
            instructions: instructions.into(),
            model: String::new(),
            temperature: None,
            tools: vec![],
            input_guardrails: vec![],
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.config.tools.extend(tools);
        self
    }

    pub fn with_input_guardrails(mut self, guardrails: Vec<Arc<dyn InputGuardrail>>) -> Self {
        self.config.input_guardrails.extend(guardrails);
        self
    }

    pub fn with_handoff_description(mut self, description: impl Into<String>) -> Self {
        self.config.handoff_description = description.into();
        self
    }

    pub fn id(&self) -> AgentId {
        self.config.id
    }

    pub fn name(&self) -> &'static str {
        self.config.id.name()
    }

    pub fn handoff_description(&self) -> &str {
        &self.config.handoff_description
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.config.tools
    }

    pub fn input_guardrails(&self) -> &[Arc<dyn InputGuardrail>] {
        &self.config.input_guardrails
    }

    pub fn find_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.config.tools.iter().find(|t| t.name() == name)
    }

    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.config.tools.iter().map(|t| t.spec()).collect()
    }

    /// System message for the current context snapshot.
    pub fn build_system_message(&self, ctx: &AirlineContext) -> Message {
        Message::system(self.config.instructions.render(ctx))
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.config.id)
            .field("model", &self.config.model)
            .field(
                "tools",
                &self.config.tools.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field("input_guardrails", &self.config.input_guardrails.len())
            .finish()
    }
}

/// All agents of one deployment, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentId, Agent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.insert(agent);
        self
    }

    /// Replaces any agent already registered with the same id.
    pub fn insert(&mut self, agent: Agent) {
        self.agents.insert(agent.id(), agent);
    }

    pub fn get(&self, id: AgentId) -> Result<&Agent> {
        self.agents.get(&id).ok_or_else(|| AgentsError::UnknownAgent {
            name: id.name().to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// The five airline agents, screened by classifier guardrails.
    pub fn airline(config: &AirlineConfig, provider: Arc<dyn ModelProvider>) -> Self {
        let guardrails = model_guardrails(provider, &config.models.guardrail);
        Self::airline_with_guardrails(config, guardrails)
    }

    /// The five airline agents, each screened by `guardrails`.
    pub fn airline_with_guardrails(
        config: &AirlineConfig,
        guardrails: Vec<Arc<dyn InputGuardrail>>,
    ) -> Self {
        let build = |id: AgentId, instructions: Instructions, tools: Vec<Arc<dyn Tool>>| {
            let mut agent = Agent::simple(id, instructions)
                .with_model(config.models.for_agent(id))
                .with_tools(tools)
                .with_input_guardrails(guardrails.clone());
            if let Some(t) = config.temperature {
                agent = agent.with_temperature(t);
            }
            agent
        };

        Self::new()
            .with_agent(build(
                AgentId::Triage,
                Instructions::Dynamic(instructions::triage),
                vec![],
            ))
            .with_agent(build(
                AgentId::SeatBooking,
                Instructions::Dynamic(instructions::seat_booking),
                tools::seat_booking_tools(),
            ))
            .with_agent(build(
                AgentId::FlightStatus,
                Instructions::Dynamic(instructions::flight_status),
                tools::flight_status_tools(),
            ))
            .with_agent(build(
                AgentId::Cancellation,
                Instructions::Dynamic(instructions::cancellation),
                tools::cancellation_tools(),
            ))
            .with_agent(build(
                AgentId::Faq,
                Instructions::Dynamic(instructions::faq),
                tools::faq_tools(),
            ))
    }
}
