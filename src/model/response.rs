use chrono::Local;
use serde::Serialize;

use crate::model::job::{JobResult, Outcome};

pub const STATUS_SUCCESS: &str = "001";
pub const STATUS_FAILURE: &str = "999";

/// The single message written back on a connection before it is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Status(Outcome),
    Error(ErrorBody),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
    pub timestamp: String,
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error(ErrorBody {
            status: "error",
            message: message.into(),
            timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Response::Status(Outcome::Success) => STATUS_SUCCESS.as_bytes().to_vec(),
            Response::Status(Outcome::Failure) => STATUS_FAILURE.as_bytes().to_vec(),
            // A struct of plain strings always serializes.
            Response::Error(body) => serde_json::to_vec(body).unwrap_or_default(),
        }
    }
}

impl From<&JobResult> for Response {
    fn from(result: &JobResult) -> Self {
        Response::Status(result.outcome)
    }
}
