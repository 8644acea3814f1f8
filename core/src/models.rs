//! JSON request/response envelopes.

use serde::{Deserialize, Serialize};

use crate::value::{RedisValue, ResponseType};

fn default_db() -> u8 {
    0
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_db")]
    pub db: u8,
}

impl CommandRequest {
    /// Commands are case-normalized to uppercase at the boundary.
    pub fn normalized_command(&self) -> String {
        self.command.to_ascii_uppercase()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineRequest {
    pub commands: Vec<CommandRequest>,
    #[serde(default = "default_db")]
    pub db: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRequest {
    pub commands: Vec<CommandRequest>,
    #[serde(default)]
    pub watch: Vec<String>,
    #[serde(default = "default_db")]
    pub db: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RedisValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "type")]
    pub type_tag: ResponseType,
    pub time: f64,
}

impl CommandResponse {
    pub fn ok(value: RedisValue, time_ms: f64) -> Self {
        Self {
            type_tag: value.type_tag(),
            result: Some(value),
            error: None,
            time: time_ms,
        }
    }

    pub fn err(message: impl Into<String>, time_ms: f64) -> Self {
        Self {
            result: None,
            error: Some(message.into()),
            type_tag: ResponseType::Nil,
            time: time_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResponse {
    pub results: Vec<CommandResponse>,
    pub time: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionResponse {
    pub queued: usize,
    pub exec: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<CommandResponse>>,
    pub time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_is_uppercased() {
        let req = CommandRequest {
            command: "get".to_string(),
            args: vec![],
            db: 0,
        };
        assert_eq!(req.normalized_command(), "GET");
    }

    #[test]
    fn command_response_err_serializes_error_not_result() {
        let resp = CommandResponse::err("boom", 1.5);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"error\":\"boom\""));
        assert!(!json.contains("\"result\""));
    }

    #[test]
    fn transaction_response_omits_results_when_not_executed() {
        let resp = TransactionResponse {
            queued: 2,
            exec: false,
            results: None,
            time: 0.5,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("\"results\""));
    }

    #[test]
    fn pipeline_response_len_matches_count() {
        let resp = PipelineResponse {
            results: vec![CommandResponse::ok(RedisValue::Int(1), 0.1)],
            time: 1.0,
            count: 1,
        };
        assert_eq!(resp.results.len(), resp.count);
    }
}
