/// Lỗi chung của wizard, hiển thị trực tiếp trong ô thông báo lỗi.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DemoError {
    #[error("No Epic session")]
    NoSession,
    #[error("no key")]
    MissingApiKey,
    #[error("no message from ChatGPT")]
    EmptySummary,
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("{0}")]
    Fhir(String),
    #[error("{0}")]
    Chat(String),
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for DemoError {
    fn from(err: serde_json::Error) -> Self {
        DemoError::Other(err.to_string())
    }
}
