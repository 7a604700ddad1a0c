//! The airline tool set.
//!
//! Lookups are plain keyword matches over canned answers. `update_seat` and
//! `cancel_flight` need a flight number in the context and fail with
//! [`AgentsError::ToolPreconditionFailed`] without touching it otherwise.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::context::AirlineContext;
use crate::error::{AgentsError, Result};
use crate::tool::{parse_args, schema_for, Tool};

/// Returned by `display_seat_map`; the presentation layer swaps it for a seat picker.
pub const DISPLAY_SEAT_MAP: &str = "DISPLAY_SEAT_MAP";

pub const FAQ_BAGGAGE: &str = "You are allowed to bring one bag on the plane. \
     It must be under 50 pounds and 22 inches x 14 inches x 9 inches.";
pub const FAQ_SEATS: &str = "There are 120 seats on the plane. \
     There are 22 business class seats and 98 economy seats. \
     Exit rows are rows 4 and 16. \
     Rows 5-8 are Economy Plus, with extra legroom.";
pub const FAQ_WIFI: &str = "We have free wifi on the plane, join Airline-Wifi";
pub const FAQ_UNKNOWN: &str = "I'm sorry, I don't know the answer to that question.";

pub const BAGGAGE_FEE: &str = "Overweight bag fee is $75.";
pub const BAGGAGE_ALLOWANCE: &str = "One carry-on and one checked bag (up to 50 lbs) are included.";
pub const BAGGAGE_UNKNOWN: &str = "Please provide details about your baggage inquiry.";

pub fn faq_answer(question: &str) -> &'static str {
    let q = question.to_lowercase();
    if q.contains("bag") || q.contains("baggage") || q.contains("luggage") {
        FAQ_BAGGAGE
    } else if q.contains("seats") || q.contains("plane") {
        FAQ_SEATS
    } else if q.contains("wifi") {
        FAQ_WIFI
    } else {
        FAQ_UNKNOWN
    }
}

pub fn baggage_answer(query: &str) -> &'static str {
    let q = query.to_lowercase();
    if q.contains("fee") {
        BAGGAGE_FEE
    } else if q.contains("allowance") {
        BAGGAGE_ALLOWANCE
    } else {
        BAGGAGE_UNKNOWN
    }
}

pub fn flight_status(flight_number: &str) -> String {
    format!("Flight {flight_number} is on time and scheduled to depart at gate A10.")
}

fn require_flight_number<'a>(tool: &str, ctx: &'a AirlineContext) -> Result<&'a str> {
    ctx.flight_number
        .as_deref()
        .ok_or_else(|| AgentsError::precondition(tool, "flight_number"))
}

/// Changes the seat on the booking currently in context.
pub fn update_seat(
    ctx: &mut AirlineContext,
    confirmation_number: &str,
    new_seat: &str,
) -> Result<String> {
    require_flight_number(UpdateSeatTool::NAME, ctx)?;
    ctx.confirmation_number = Some(confirmation_number.to_string());
    ctx.seat_number = Some(new_seat.to_string());
    Ok(format!(
        "Updated seat to {new_seat} for confirmation number {confirmation_number}"
    ))
}

/// Cancels the flight currently in context.
pub fn cancel_flight(ctx: &AirlineContext) -> Result<String> {
    let flight = require_flight_number(CancelFlightTool::NAME, ctx)?;
    Ok(format!("Flight {flight} successfully cancelled"))
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FaqLookupArgs {
    /// The customer's question
    pub question: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateSeatArgs {
    /// Confirmation number of the booking
    pub confirmation_number: String,
    /// The seat to move the passenger to, e.g. "14C"
    pub new_seat: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FlightStatusArgs {
    /// Flight number to look up
    pub flight_number: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BaggageArgs {
    /// The customer's baggage question
    pub query: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoArgs {}

/// Expands to the `name`/`description`/`parameters_schema` trio of a [`Tool`] impl.
macro_rules! tool_identity {
    ($description:literal, $args:ty) => {
        fn name(&self) -> &str {
            Self::NAME
        }

        fn description(&self) -> &str {
            $description
        }

        fn parameters_schema(&self) -> Value {
            schema_for::<$args>()
        }
    };
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FaqLookupTool;

impl FaqLookupTool {
    pub const NAME: &'static str = "faq_lookup_tool";
}

#[async_trait]
impl Tool for FaqLookupTool {
    tool_identity!("Lookup frequently asked questions.", FaqLookupArgs);

    async fn execute(&self, _ctx: &mut AirlineContext, arguments: Value) -> Result<String> {
        let args: FaqLookupArgs = parse_args(Self::NAME, arguments)?;
        Ok(faq_answer(&args.question).to_string())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateSeatTool;

impl UpdateSeatTool {
    pub const NAME: &'static str = "update_seat";
}

#[async_trait]
impl Tool for UpdateSeatTool {
    tool_identity!("Update the seat for a given confirmation number.", UpdateSeatArgs);

    async fn execute(&self, ctx: &mut AirlineContext, arguments: Value) -> Result<String> {
        let args: UpdateSeatArgs = parse_args(Self::NAME, arguments)?;
        update_seat(ctx, &args.confirmation_number, &args.new_seat)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlightStatusTool;

impl FlightStatusTool {
    pub const NAME: &'static str = "flight_status_tool";
}

#[async_trait]
impl Tool for FlightStatusTool {
    tool_identity!("Lookup status for a flight.", FlightStatusArgs);

    async fn execute(&self, _ctx: &mut AirlineContext, arguments: Value) -> Result<String> {
        let args: FlightStatusArgs = parse_args(Self::NAME, arguments)?;
        Ok(flight_status(&args.flight_number))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BaggageTool;

impl BaggageTool {
    pub const NAME: &'static str = "baggage_tool";
}

#[async_trait]
impl Tool for BaggageTool {
    tool_identity!("Lookup baggage allowance and fees.", BaggageArgs);

    async fn execute(&self, _ctx: &mut AirlineContext, arguments: Value) -> Result<String> {
        let args: BaggageArgs = parse_args(Self::NAME, arguments)?;
        Ok(baggage_answer(&args.query).to_string())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DisplaySeatMapTool;

impl DisplaySeatMapTool {
    pub const NAME: &'static str = "display_seat_map";
}

#[async_trait]
impl Tool for DisplaySeatMapTool {
    tool_identity!(
        "Display an interactive seat map to the customer so they can choose a new seat.",
        NoArgs
    );

    async fn execute(&self, _ctx: &mut AirlineContext, _arguments: Value) -> Result<String> {
        Ok(DISPLAY_SEAT_MAP.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CancelFlightTool;

impl CancelFlightTool {
    pub const NAME: &'static str = "cancel_flight";
}

#[async_trait]
impl Tool for CancelFlightTool {
    tool_identity!("Cancel a flight.", NoArgs);

    async fn execute(&self, ctx: &mut AirlineContext, _arguments: Value) -> Result<String> {
        cancel_flight(ctx)
    }
}

/// Tools of the seat booking agent.
pub fn seat_booking_tools() -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(UpdateSeatTool), Arc::new(DisplaySeatMapTool)]
}

/// Tools of the flight status agent.
pub fn flight_status_tools() -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(FlightStatusTool)]
}

/// Tools of the cancellation agent.
pub fn cancellation_tools() -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(CancelFlightTool)]
}

/// Tools of the FAQ agent.
pub fn faq_tools() -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(FaqLookupTool), Arc::new(BaggageTool)]
}
