use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A proposed or executed step of the ReAct loop.
///
/// `r#type` discriminates the action; `parameters` is an open map rather
/// than a closed enum of fields, since tools registered at runtime
/// introduce action types the core has never heard of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub r#type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl Action {
    pub fn new(r#type: impl Into<String>, parameters: Value) -> Self {
        Self {
            r#type: r#type.into(),
            description: None,
            parameters,
            result: None,
        }
    }

    pub fn finish(result: Value) -> Self {
        Self {
            r#type: "finish".to_string(),
            description: None,
            parameters: Value::Object(Default::default()),
            result: Some(result),
        }
    }

    pub fn is_finish(&self) -> bool {
        self.r#type == "finish"
    }
}

/// The result of executing an `Action`, folded back into the loop as a
/// structured observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Observation {
    pub fn success(result: Value) -> Self {
        Self {
            status: "success".to_string(),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            result: None,
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}
