//! # Agent Handoff System
//!
//! A handoff transfers control of the conversation from one agent to another.
//! The model sees each permitted handoff as a function named
//! `transfer_to_<agent_name>`; calling it switches the active agent.
//!
//! Permitted transfers form an explicit [`HandoffGraph`], built in one pass.
//! The airline graph is a star: triage reaches every leaf, every leaf returns
//! only to triage. An edge may carry an [`OnHandoff`] callback that runs once,
//! synchronously, against the session context before the target sees any
//! input.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::agent::{AgentId, AgentRegistry};
use crate::context::{AirlineContext, BookingIds, RandomBookingIds};
use crate::error::{AgentsError, Result};
use crate::tool::ToolSpec;

/// Side effect run at the moment control transfers along an edge.
pub trait OnHandoff: Send + Sync {
    fn name(&self) -> &str;

    fn on_handoff(&self, ctx: &mut AirlineContext);
}

/// Seat booking always starts from a freshly issued booking.
pub struct SeatBookingTransfer {
    ids: Arc<dyn BookingIds>,
}

impl SeatBookingTransfer {
    pub fn new(ids: Arc<dyn BookingIds>) -> Self {
        Self { ids }
    }
}

impl OnHandoff for SeatBookingTransfer {
    fn name(&self) -> &str {
        "on_seat_booking_handoff"
    }

    fn on_handoff(&self, ctx: &mut AirlineContext) {
        ctx.flight_number = Some(self.ids.flight_number());
        ctx.confirmation_number = Some(self.ids.confirmation_number());
    }
}

/// Cancellation keeps whatever booking the session already knows about.
pub struct CancellationTransfer {
    ids: Arc<dyn BookingIds>,
}

impl CancellationTransfer {
    pub fn new(ids: Arc<dyn BookingIds>) -> Self {
        Self { ids }
    }
}

impl OnHandoff for CancellationTransfer {
    fn name(&self) -> &str {
        "on_cancellation_handoff"
    }

    fn on_handoff(&self, ctx: &mut AirlineContext) {
        if ctx.flight_number.is_none() {
            ctx.flight_number = Some(self.ids.flight_number());
        }
        if ctx.confirmation_number.is_none() {
            ctx.confirmation_number = Some(self.ids.confirmation_number());
        }
    }
}

/// One outgoing edge.
#[derive(Clone)]
pub struct Handoff {
    pub target: AgentId,
    /// Overrides the target agent's own handoff description on this edge.
    pub description: Option<String>,
    pub on_handoff: Option<Arc<dyn OnHandoff>>,
}

impl Handoff {
    pub fn new(target: AgentId) -> Self {
        Self {
            target,
            description: None,
            on_handoff: None,
        }
    }

    pub fn with_callback(mut self, callback: Arc<dyn OnHandoff>) -> Self {
        self.on_handoff = Some(callback);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Text shown to the source agent to help it decide when to delegate.
    pub fn description(&self) -> &str {
        self.description
            .as_deref()
            .unwrap_or_else(|| self.target.handoff_description())
    }

    /// Function name advertised to the model, e.g. `transfer_to_faq_agent`.
    pub fn tool_name(&self) -> String {
        tool_name_for(self.target)
    }

    pub fn tool_spec(&self) -> ToolSpec {
        self.tool_spec_described(self.description())
    }

    fn tool_spec_described(&self, description: &str) -> ToolSpec {
        ToolSpec {
            name: self.tool_name(),
            description: format!(
                "Handoff to the {} agent to handle the request. {}",
                self.target.name(),
                description
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "reason": {
                        "type": "string",
                        "description": "Why the conversation is being transferred"
                    }
                },
                "required": []
            }),
        }
    }
}

impl std::fmt::Debug for Handoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handoff")
            .field("target", &self.target)
            .field("description", &self.description)
            .field("on_handoff", &self.on_handoff.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}

pub fn tool_name_for(target: AgentId) -> String {
    let snake = target
        .name()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    format!("transfer_to_{snake}")
}

/// Record of one completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffData {
    pub from_agent: AgentId,
    pub to_agent: AgentId,
    pub reason: Option<String>,
}

/// Directed graph of permitted transfers.
#[derive(Debug, Clone, Default)]
pub struct HandoffGraph {
    edges: BTreeMap<AgentId, Vec<Handoff>>,
}

impl HandoffGraph {
    pub fn builder() -> HandoffGraphBuilder {
        HandoffGraphBuilder::default()
    }

    /// The standard airline star, drawing booking ids from `ids`.
    pub fn airline(ids: Arc<dyn BookingIds>) -> Self {
        let mut builder = Self::builder()
            .edge(AgentId::Triage, Handoff::new(AgentId::FlightStatus))
            .edge(
                AgentId::Triage,
                Handoff::new(AgentId::Cancellation)
                    .with_callback(Arc::new(CancellationTransfer::new(ids.clone()))),
            )
            .edge(AgentId::Triage, Handoff::new(AgentId::Faq))
            .edge(
                AgentId::Triage,
                Handoff::new(AgentId::SeatBooking)
                    .with_callback(Arc::new(SeatBookingTransfer::new(ids))),
            );
        for leaf in AgentId::LEAVES {
            builder = builder.edge(leaf, Handoff::new(AgentId::Triage));
        }
        builder.build()
    }

    /// [`HandoffGraph::airline`] with thread-RNG booking ids.
    pub fn airline_default() -> Self {
        Self::airline(Arc::new(RandomBookingIds))
    }

    pub fn targets(&self, from: AgentId) -> &[Handoff] {
        self.edges.get(&from).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn allows(&self, from: AgentId, to: AgentId) -> bool {
        self.edge(from, to).is_some()
    }

    fn edge(&self, from: AgentId, to: AgentId) -> Option<&Handoff> {
        self.targets(from).iter().find(|h| h.target == to)
    }

    /// The edge out of `from` advertised under `tool_name`, if any.
    pub fn resolve_tool(&self, from: AgentId, tool_name: &str) -> Option<&Handoff> {
        self.targets(from).iter().find(|h| h.tool_name() == tool_name)
    }

    /// Function specs for every edge out of `from`.
    ///
    /// An edge without its own description uses the registered target
    /// agent's `handoff_description`.
    pub fn tool_specs(&self, from: AgentId, agents: &AgentRegistry) -> Vec<ToolSpec> {
        self.targets(from)
            .iter()
            .map(|h| match (&h.description, agents.get(h.target)) {
                (None, Ok(target)) => h.tool_spec_described(target.handoff_description()),
                _ => h.tool_spec(),
            })
            .collect()
    }

    /// Move control along `from -> to`, running the edge's callback.
    ///
    /// An undeclared edge is an error and leaves `ctx` untouched.
    pub fn transfer(&self, from: AgentId, to: AgentId, ctx: &mut AirlineContext) -> Result<AgentId> {
        let edge = self.edge(from, to).ok_or_else(|| AgentsError::HandoffError {
            message: format!("{from} cannot hand off to {to}"),
        })?;
        if let Some(callback) = &edge.on_handoff {
            debug!(callback = callback.name(), "Running handoff callback");
            callback.on_handoff(ctx);
        }
        info!(from = %from, to = %to, "Handoff");
        Ok(to)
    }
}

/// Collects edges, then freezes them into a [`HandoffGraph`].
#[derive(Debug, Default)]
pub struct HandoffGraphBuilder {
    edges: BTreeMap<AgentId, Vec<Handoff>>,
}

impl HandoffGraphBuilder {
    /// Add `from -> handoff.target`. A repeated edge replaces the earlier one.
    pub fn edge(mut self, from: AgentId, handoff: Handoff) -> Self {
        let out = self.edges.entry(from).or_default();
        out.retain(|h| h.target != handoff.target);
        out.push(handoff);
        self
    }

    pub fn build(self) -> HandoffGraph {
        HandoffGraph { edges: self.edges }
    }
}
