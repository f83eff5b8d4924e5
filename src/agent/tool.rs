//! Actions the research agent may request.
//!
//! Tool calls arrive from the model as a name plus JSON arguments. They are
//! decoded into the closed [`AgentAction`] enum; there is no dynamic
//! dispatch by name. New actions are added as new variants.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AgentError;

/// Name under which the search action is advertised to the model.
pub const SEARCH_TOOL: &str = "search_maintenance_docs";

/// Maximum raw byte length of action arguments from the model.
const MAX_ARGS_LEN: usize = 10_000;

/// A tool definition sent to the model for function-calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// What the tool does, written for the model.
    pub description: String,
    /// JSON Schema object describing the parameters.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier assigned by the provider.
    pub id: String,
    /// Name of the requested tool.
    pub name: String,
    /// JSON-encoded arguments.
    pub arguments: String,
}

/// A decoded action request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentAction {
    /// Search the document index.
    Search {
        /// Query text, exactly as the model wrote it.
        query: String,
    },
}

impl AgentAction {
    /// Decodes a tool call into a known action.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ToolArguments`] for unknown names, oversized or
    /// malformed arguments, or an empty query.
    pub fn from_call(call: &ToolCall) -> Result<Self, AgentError> {
        #[derive(Deserialize)]
        struct SearchArgs {
            query: String,
        }

        let bad = |message: String| AgentError::ToolArguments {
            name: call.name.clone(),
            message,
        };

        if call.arguments.len() > MAX_ARGS_LEN {
            return Err(bad(format!(
                "arguments too large ({} bytes, max {MAX_ARGS_LEN})",
                call.arguments.len()
            )));
        }

        match call.name.as_str() {
            SEARCH_TOOL => {
                let args: SearchArgs = serde_json::from_str(&call.arguments)
                    .map_err(|e| bad(format!("invalid arguments: {e}")))?;
                if args.query.trim().is_empty() {
                    return Err(bad("query must not be empty".to_string()));
                }
                Ok(Self::Search { query: args.query })
            }
            _ => Err(bad("unknown action".to_string())),
        }
    }

    /// Query of a search action.
    #[must_use]
    pub fn query(&self) -> &str {
        match self {
            Self::Search { query } => query,
        }
    }

    /// Definitions of every action, for binding to a request.
    #[must_use]
    pub fn definitions() -> Vec<ToolDefinition> {
        vec![def_search()]
    }
}

/// An assistant turn split into decoded actions and rejected calls.
#[derive(Debug, Clone, Default)]
pub struct DecodedTurn {
    /// Calls that decoded into actions, with the call they came from.
    pub actions: Vec<(ToolCall, AgentAction)>,
    /// Calls that could not be decoded, with the reason.
    pub rejected: Vec<(ToolCall, String)>,
}

impl DecodedTurn {
    /// Decodes every call of a turn.
    #[must_use]
    pub fn decode(calls: &[ToolCall]) -> Self {
        let mut turn = Self::default();
        for call in calls {
            match AgentAction::from_call(call) {
                Ok(action) => turn.actions.push((call.clone(), action)),
                Err(e) => turn.rejected.push((call.clone(), e.to_string())),
            }
        }
        turn
    }

    /// Search queries requested by this turn, in call order.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.actions
            .iter()
            .map(|(_, action)| action.query().to_string())
            .collect()
    }

    /// Returns `true` if the turn carried any call at all.
    #[must_use]
    pub fn is_request(&self) -> bool {
        !self.actions.is_empty() || !self.rejected.is_empty()
    }
}

fn def_search() -> ToolDefinition {
    ToolDefinition {
        name: SEARCH_TOOL.to_string(),
        description: "Search the maintenance documentation knowledge base for procedures, \
                      schedules, error codes, part specifications, lubrication intervals and \
                      safety warnings. If results mention other pages, tables or notes \
                      (\"See Table 5-10\", \"Refer to Page 131\", \"Note 4\"), search again \
                      for that specific content."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query describing the information needed."
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn test_decode_search() {
        let action = AgentAction::from_call(&call(SEARCH_TOOL, r#"{"query":"torque spec table"}"#));
        assert_eq!(
            action.ok(),
            Some(AgentAction::Search {
                query: "torque spec table".to_string()
            })
        );
    }

    #[test]
    fn test_query_is_not_normalised() {
        let action = AgentAction::from_call(&call(SEARCH_TOOL, r#"{"query":"  Torque Spec "}"#));
        assert_eq!(action.map(|a| a.query().to_string()).ok().as_deref(), Some("  Torque Spec "));
    }

    #[test_case("get_chunks", r#"{"query":"x"}"# ; "unknown action")]
    #[test_case(SEARCH_TOOL, "not json" ; "malformed json")]
    #[test_case(SEARCH_TOOL, r#"{"q":"x"}"# ; "missing query")]
    #[test_case(SEARCH_TOOL, r#"{"query":"   "}"# ; "blank query")]
    fn test_decode_rejects(name: &str, arguments: &str) {
        let err = AgentAction::from_call(&call(name, arguments));
        assert!(matches!(err, Err(AgentError::ToolArguments { .. })));
    }

    #[test]
    fn test_decode_rejects_oversized() {
        let args = format!(r#"{{"query":"{}"}}"#, "a".repeat(MAX_ARGS_LEN));
        assert!(AgentAction::from_call(&call(SEARCH_TOOL, &args)).is_err());
    }

    #[test]
    fn test_decoded_turn_splits_calls() {
        let turn = DecodedTurn::decode(&[
            call(SEARCH_TOOL, r#"{"query":"a"}"#),
            call("delete_everything", "{}"),
            call(SEARCH_TOOL, r#"{"query":"b"}"#),
        ]);
        assert_eq!(turn.queries(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(turn.rejected.len(), 1);
        assert!(turn.is_request());
        assert!(!DecodedTurn::decode(&[]).is_request());
    }

    #[test]
    fn test_definitions_have_valid_schemas() {
        for def in AgentAction::definitions() {
            assert!(!def.description.is_empty());
            assert_eq!(def.parameters["type"], "object");
        }
    }
}
