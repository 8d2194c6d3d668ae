use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{"state": true, "result": ...}` or `{"state": false, "error": "..."}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub state: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    pub fn ok(result: Value) -> Self {
        Self {
            state: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(error: &Error) -> Self {
        Self {
            state: false,
            result: None,
            error: Some(error.to_string()),
        }
    }

    pub fn from_result(result: Result<Value>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self::err(&e),
        }
    }
}
