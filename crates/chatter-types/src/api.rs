use serde::{Deserialize, Serialize};

// -- Users --

/// Body of `POST /user` and `DELETE /user`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserRequest {
    pub user: String,
}

// -- Messages --

/// Body of `POST /message`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostMessageRequest {
    pub user: String,
    pub msg: String,
}

/// Acknowledgement body returned by every mutating route, and by failures.
/// `status` mirrors the HTTP status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    pub status: u16,
    pub message: String,
}

impl AckResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: 200,
            message: message.into(),
        }
    }
}
