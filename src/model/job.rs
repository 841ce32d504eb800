use std::fmt::Display;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use uuid::Uuid;

use crate::error::DecodeError;

/// Encoded into the QR symbol when the request carries no `qr_data`.
pub const NO_QR_DATA: &str = "NO DATA";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        };
        write!(f, "{}", str)
    }
}

/// One decoded label request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: Uuid,
    pub source: String,
    pub qr_payload: String,
    pub name: String,
    pub employee_id: String,
    pub department: String,
    /// `None` means "today, at render time".
    pub issue_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct JobRequest {
    #[serde(default, deserialize_with = "display_string")]
    qr_data: Option<String>,
    #[serde(default, deserialize_with = "display_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "display_string")]
    employee_id: Option<String>,
    #[serde(default, deserialize_with = "display_string")]
    department: Option<String>,
    #[serde(default, deserialize_with = "display_string")]
    issue_date: Option<String>,
}

/// Accepts any JSON scalar; strings are taken verbatim, null is absent and
/// everything else is kept as its JSON text.
fn display_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Job {
    /// Decode one fully received request payload.
    pub fn decode(payload: &[u8], source: impl Into<String>) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(payload)?;
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(DecodeError::NotObject {
                found: json_kind(&value),
            });
        }
        // Derived struct deserialization would also accept an array, by position.
        let request = JobRequest::deserialize(value)?;

        Ok(Self {
            id: Uuid::new_v4(),
            source: source.into(),
            qr_payload: request.qr_data.unwrap_or_else(|| NO_QR_DATA.to_string()),
            name: request.name.unwrap_or_default(),
            employee_id: request.employee_id.unwrap_or_default(),
            department: request.department.unwrap_or_default(),
            issue_date: request.issue_date,
        })
    }
}

/// What happened to a job. Produced once by the print serializer and consumed
/// once by the connection that submitted the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub job_id: Uuid,
    pub outcome: Outcome,
    pub error_detail: Option<String>,
}

impl JobResult {
    pub fn success(job_id: Uuid) -> Self {
        Self {
            job_id,
            outcome: Outcome::Success,
            error_detail: None,
        }
    }

    pub fn failure(job_id: Uuid, detail: impl Into<String>) -> Self {
        Self {
            job_id,
            outcome: Outcome::Failure,
            error_detail: Some(detail.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}
