//! Tool system for agents
//!
//! A tool is a named operation with a typed argument struct and a text result.
//! Only the agent holding the turn can reach its tools, and each call is
//! handed the session's [`AirlineContext`] by the runner.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;

use crate::context::AirlineContext;
use crate::error::{AgentsError, Result};

/// Function description advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Trait for all tools that can be used by agents
#[async_trait]
pub trait Tool: Send + Sync + Debug {
    /// Get the name of the tool
    fn name(&self) -> &str;

    /// Get the description of the tool
    fn description(&self) -> &str;

    /// Get the JSON schema for the tool's parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool against the session context.
    ///
    /// Precondition failures come back as
    /// [`AgentsError::ToolPreconditionFailed`] and abort the turn; argument
    /// problems come back as [`AgentsError::ToolArguments`].
    async fn execute(&self, ctx: &mut AirlineContext, arguments: Value) -> Result<String>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// JSON schema of an argument struct, in the shape function-calling expects.
pub fn schema_for<A: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(A);
    let mut value = serde_json::to_value(schema.schema)
        .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));
    if let Value::Object(map) = &mut value {
        map.remove("title");
        // Providers reject argument-less functions without a properties map.
        map.entry("properties")
            .or_insert_with(|| Value::Object(Default::default()));
    }
    value
}

/// Decode the model-supplied arguments for `tool`.
pub fn parse_args<A: DeserializeOwned>(tool: &str, arguments: Value) -> Result<A> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        // Some providers send the arguments object JSON-encoded as a string.
        Value::String(raw) => serde_json::from_str(&raw).map_err(|e| AgentsError::ToolArguments {
            tool: tool.to_string(),
            message: e.to_string(),
        })?,
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| AgentsError::ToolArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}
