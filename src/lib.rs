//! # Airline customer-service agents
//!
//! A Tower-friendly orchestrator for a small team of airline agents: a triage
//! agent that routes each conversation to seat booking, flight status,
//! cancellation or FAQ specialists. Agents share a per-session
//! [`AirlineContext`], call deterministic domain tools, and every user message
//! is screened by relevance and jailbreak guardrails before an agent sees it.
//!
//! ## Core Concepts
//!
//! - **Agent**: an [`AgentId`], an instruction template, a model, a tool subset
//!   and its input guardrails
//! - **Handoffs**: an explicit [`HandoffGraph`]; triage reaches every leaf and
//!   every leaf returns only to triage
//! - **Turns**: [`Runner::run_turn`] is atomic; [`TurnService`] exposes it as a
//!   `tower::Service` that serializes turns of one session
//! - **Static DI**: configuration and the model provider are injected at
//!   construction time; there is no global state
//!
//! ## Getting Started
//!
//! Set `GEMINI_API_KEY` (or point `AIRLINE_BASE_URL` at any OpenAI-compatible
//! endpoint).
//!
//! ```rust,no_run
//! use airline_agents::{AirlineConfig, OpenAIProvider, Runner, Session};
//! use std::sync::Arc;
//!
//! # async fn example() -> airline_agents::Result<()> {
//! let config = AirlineConfig::from_env()?;
//! let provider = Arc::new(OpenAIProvider::new(&config.api_key, &config.base_url));
//! let runner = Runner::airline(&config, provider);
//!
//! let mut session = Session::new();
//! match runner.run_turn(&mut session, "I need to change my seat on a flight.").await {
//!     Ok(turn) => println!("{}: {}", turn.last_agent, turn.final_output),
//!     Err(e) if e.is_tripwire() => println!("blocked: {e}"),
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod guardrail;
pub mod handoff;
pub mod instructions;
pub mod items;
pub mod model;
pub mod runner;
pub mod service;
pub mod tool;
pub mod tools;
pub mod usage;

// Public re-exports for convenience
pub use agent::{Agent, AgentConfig, AgentId, AgentRegistry, Instructions};
pub use config::{AirlineConfig, LogFormat, ModelConfig};
pub use context::{AirlineContext, BookingIds, RandomBookingIds, SeededBookingIds};
pub use error::{AgentsError, Result};
pub use guardrail::{
    GuardrailRunner, GuardrailVerdict, InputGuardrail, JailbreakRules, ModelGuardrail,
    RelevanceRules,
};
pub use handoff::{Handoff, HandoffData, HandoffGraph, OnHandoff};
pub use items::{Message, ModelResponse, Role, RunItem, ToolCall};
pub use model::{ModelProvider, ModelRequest, OpenAIProvider, ScriptedProvider};
pub use runner::{RunConfig, Runner, Session, TurnResult};
pub use service::TurnService;
pub use tool::{Tool, ToolSpec};
pub use tools::DISPLAY_SEAT_MAP;
pub use usage::{Usage, UsageStats};

// Re-export Tower traits that users need
pub use tower::{Service, ServiceExt};
