use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::FhirError;

const FHIR_JSON: &str = "application/fhir+json";

/// An authorized FHIR client with a patient launch context.
#[allow(async_fn_in_trait)]
pub trait FhirClient {
    fn patient_id(&self) -> Option<&str>;

    /// GET a path relative to the FHIR base URL.
    async fn request(&self, path: &str) -> Result<Value, FhirError>;
}

#[derive(Debug, Clone)]
pub struct HttpFhirClient {
    http: reqwest::Client,
    base_url: Url,
    access_token: String,
    patient: Option<String>,
}

impl HttpFhirClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        access_token: impl Into<String>,
        patient: Option<String>,
    ) -> Result<Self, FhirError> {
        Ok(Self {
            http,
            base_url: base_url_with_slash(base_url)?,
            access_token: access_token.into(),
            patient,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl FhirClient for HttpFhirClient {
    fn patient_id(&self) -> Option<&str> {
        self.patient.as_deref()
    }

    async fn request(&self, path: &str) -> Result<Value, FhirError> {
        let url = self.base_url.join(path)?;
        debug!(%url, "FHIR read");

        let response = self
            .http
            .get(url.clone())
            .bearer_auth(&self.access_token)
            .header(ACCEPT, FHIR_JSON)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FhirError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

/// Percent-encode a value for use as one path segment or query value.
pub(crate) fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// `Url::join` drops the last segment unless the base ends with `/`.
pub(crate) fn base_url_with_slash(base: &str) -> Result<Url, FhirError> {
    if base.ends_with('/') {
        Ok(Url::parse(base)?)
    } else {
        Ok(Url::parse(&format!("{base}/"))?)
    }
}
