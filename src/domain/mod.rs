//! Call and response envelopes exchanged with the language model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::error::{ErrorKind, ToolError};

/// Normalized tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative_tool: Option<String>,
}

impl From<&ToolError> for ErrorInfo {
    fn from(err: &ToolError) -> Self {
        Self {
            kind: err.kind(),
            message: err.message().to_string(),
            suggestion: err.user_hint().map(str::to_string),
            alternative_tool: None,
        }
    }
}

/// Envelope returned for every call; errors never escape as `Err`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub status: ToolStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cached: bool,
    pub duration_ms: u64,
}

impl ToolResponse {
    pub fn success(payload: Value) -> Self {
        Self {
            status: ToolStatus::Success,
            payload: Some(payload),
            error: None,
            cached: false,
            duration_ms: 0,
        }
    }

    pub fn failure(error: ErrorInfo) -> Self {
        Self {
            status: ToolStatus::Error,
            payload: None,
            error: Some(error),
            cached: false,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            format!(
                "{{\"status\":\"Error\",\"error\":{{\"kind\":\"Internal\",\"message\":\"{}\"}}}}",
                e
            )
        })
    }
}

/// Caller-selected mode that can forbid specific operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallMode {
    #[default]
    Default,
    /// Surgical edits only: full-file rewrites are refused.
    Amend,
}

impl FromStr for CallMode {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "default" | "normal" => Ok(CallMode::Default),
            "amend" => Ok(CallMode::Amend),
            other => Err(ToolError::BadRequest(format!(
                "Unknown mode '{}'. Expected 'default' or 'amend'.",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope_shape() {
        let response = ToolResponse::success(json!({"content": "hello\n"}));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "Success");
        assert_eq!(value["payload"]["content"], "hello\n");
        assert!(value.get("error").is_none());
        assert!(value.get("cached").is_none());
    }

    #[test]
    fn test_error_envelope_shape() {
        let err = ToolError::NotFound("File not found: a.txt".into());
        let mut info = ErrorInfo::from(&err);
        info.alternative_tool = Some("get_project_structure".into());
        let value = serde_json::to_value(ToolResponse::failure(info)).unwrap();
        assert_eq!(value["status"], "Error");
        assert_eq!(value["error"]["kind"], "NotFound");
        assert_eq!(value["error"]["alternativeTool"], "get_project_structure");
    }

    #[test]
    fn test_call_mode_parse() {
        assert_eq!("amend".parse::<CallMode>().unwrap(), CallMode::Amend);
        assert_eq!("".parse::<CallMode>().unwrap(), CallMode::Default);
        assert!("yolo".parse::<CallMode>().is_err());
    }
}
