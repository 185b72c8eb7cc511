use serde::{Deserialize, Serialize};

/// Body of the mark-paid command. The note is passed through verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MarkPaidRequest {
    pub note: String,
}

/// Generic `{ success, message }` envelope returned by mutating endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Envelope {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Envelope {
    /// Missing `success` counts as success; only an explicit `false` fails.
    pub fn is_success(&self) -> bool {
        self.success.unwrap_or(true)
    }
}
