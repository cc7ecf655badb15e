use ehr_demo_core::DemoError;

#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("No Epic session")]
    NoSession,
    #[error("SMART discovery failed for {issuer}: {reason}")]
    Discovery { issuer: String, reason: String },
    #[error("Authorization state `{0}` is unknown or already used")]
    UnknownState(String),
    #[error("Authorization failed ({error}): {description}")]
    Authorization { error: String, description: String },
    #[error("Request to {url} failed with status {status}")]
    Status { status: u16, url: String },
    #[error("Unexpected FHIR payload: {0}")]
    Payload(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Core(DemoError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<DemoError> for FhirError {
    fn from(err: DemoError) -> Self {
        match err {
            DemoError::NoSession => FhirError::NoSession,
            DemoError::Storage(message) => FhirError::Storage(message),
            other => FhirError::Core(other),
        }
    }
}

impl From<FhirError> for DemoError {
    fn from(err: FhirError) -> Self {
        match err {
            FhirError::NoSession => DemoError::NoSession,
            FhirError::Core(err) => err,
            other => DemoError::Fhir(other.to_string()),
        }
    }
}
