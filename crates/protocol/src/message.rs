use conductor_core::{CommandPhase, RetVal};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::error::{ProtocolError, Result};

pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Conductor hands a phase to a player
    Phase,
    /// Conductor tells the player to run the phase it holds
    Run,
    Config,
    /// Player reports one step result
    Result,
    Done,
    Error,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phase => "phase",
            Self::Run => "run",
            Self::Config => "config",
            Self::Result => "result",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "phase" => Some(Self::Phase),
            "run" => Some(Self::Run),
            "config" => Some(Self::Config),
            "result" => Some(Self::Result),
            "done" => Some(Self::Done),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol message: `{"version": 1, "type": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub data: Map<String, Value>,
}

impl Envelope {
    pub fn new(message_type: MessageType, data: Map<String, Value>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message_type,
            data,
        }
    }

    pub fn phase(phase: &CommandPhase) -> Result<Self> {
        Ok(Self::new(MessageType::Phase, to_object(phase)?))
    }

    pub fn result(result: &RetVal) -> Result<Self> {
        Ok(Self::new(MessageType::Result, to_object(result)?))
    }

    pub fn run() -> Self {
        Self::new(MessageType::Run, Map::new())
    }

    pub fn error(message: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("message".to_string(), Value::String(message.into()));
        Self::new(MessageType::Error, data)
    }

    pub fn into_phase(self) -> Result<CommandPhase> {
        self.expect(MessageType::Phase)?;
        Ok(serde_json::from_value(Value::Object(self.data))?)
    }

    /// Missing `code` or `message` fields take their defaults.
    pub fn into_retval(self) -> Result<RetVal> {
        self.expect(MessageType::Result)?;
        Ok(serde_json::from_value(Value::Object(self.data))?)
    }

    /// Parse and check one frame body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(body)
            .map_err(|e| ProtocolError::InvalidFormat(format!("body is not UTF-8: {}", e)))?;
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ProtocolError::InvalidFormat(e.to_string()))?;

        let object = match value {
            Value::Object(object) => object,
            other => return Err(ProtocolError::NotAnObject(json_type_name(&other))),
        };

        match object.get("version") {
            None => return Err(ProtocolError::MissingVersion),
            Some(version) if version.as_u64() != Some(u64::from(PROTOCOL_VERSION)) => {
                return Err(ProtocolError::UnsupportedVersion(version.clone()));
            }
            Some(_) => {}
        }

        serde_json::from_value(Value::Object(object))
            .map_err(|e| ProtocolError::InvalidFormat(e.to_string()))
    }

    fn expect(&self, expected: MessageType) -> Result<()> {
        if self.message_type == expected {
            Ok(())
        } else {
            Err(ProtocolError::UnexpectedType {
                expected,
                actual: self.message_type,
            })
        }
    }
}

fn to_object<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(object) => Ok(object),
        other => Err(ProtocolError::NotAnObject(json_type_name(&other))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
