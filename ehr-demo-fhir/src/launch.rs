use chrono::{DateTime, Duration, Utc};
use ehr_demo_core::{SmartConfig, Storage};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::client::base_url_with_slash;
use crate::{FhirError, HttpFhirClient, Launcher, Pkce};

/// Storage key prefix for authorizations waiting on the redirect, keyed by `state`.
pub const PENDING_STATE_PREFIX: &str = "ehr-demo.smart.pending.";

/// Storage key of the resolved session (token and patient context).
pub const SESSION_STORAGE_KEY: &str = "ehr-demo.smart.session";

const OAUTH_URIS_EXTENSION: &str =
    "http://fhir-registry.smarthealthit.org/StructureDefinition/oauth-uris";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmartEndpoints {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingAuthorization {
    issuer: String,
    client_id: String,
    redirect_uri: String,
    token_endpoint: String,
    code_verifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub patient: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Session persisted after a successful token exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredSession {
    pub issuer: String,
    pub access_token: String,
    pub patient: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredSession {
    pub fn from_token(issuer: String, token: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            issuer,
            access_token: token.access_token,
            patient: token.patient,
            expires_at: token.expires_in.and_then(|seconds| expiry_after(now, seconds)),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// `None` (no expiry) when `expires_in` does not fit a timestamp.
fn expiry_after(now: DateTime<Utc>, seconds: i64) -> Option<DateTime<Utc>> {
    let expires_at =
        Duration::try_seconds(seconds).and_then(|delta| now.checked_add_signed(delta));
    if expires_at.is_none() {
        warn!(expires_in = seconds, "token lifetime out of range, treating as no expiry");
    }
    expires_at
}

/// `code` and `state` carried by the redirect back to the callback route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

impl CallbackParams {
    /// `Ok(None)` when the URL is not an authorization redirect.
    pub fn from_url(url: &Url) -> Result<Option<Self>, FhirError> {
        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut description = None;

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => description = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Err(FhirError::Authorization {
                error,
                description: description.unwrap_or_default(),
            });
        }

        match (code, state) {
            (Some(code), Some(state)) => Ok(Some(Self { code, state })),
            _ => Ok(None),
        }
    }

    pub fn from_href(href: &str) -> Result<Option<Self>, FhirError> {
        Self::from_url(&Url::parse(href)?)
    }
}

/// Locate the OAuth endpoints advertised by a FHIR server.
///
/// Tries `.well-known/smart-configuration` first and falls back to the
/// `oauth-uris` extension of the CapabilityStatement.
pub async fn discover(http: &reqwest::Client, issuer: &str) -> Result<SmartEndpoints, FhirError> {
    let base = base_url_with_slash(issuer)?;

    match fetch_json(http, &base.join(".well-known/smart-configuration")?).await {
        Ok(document) => match serde_json::from_value::<SmartEndpoints>(document) {
            Ok(endpoints) => return Ok(endpoints),
            Err(err) => debug!(error = %err, "smart-configuration incomplete"),
        },
        Err(err) => debug!(error = %err, "smart-configuration unavailable"),
    }

    let metadata = fetch_json(http, &base.join("metadata")?).await?;
    endpoints_from_capability_statement(&metadata).ok_or_else(|| FhirError::Discovery {
        issuer: issuer.to_string(),
        reason: "CapabilityStatement has no oauth-uris extension".to_string(),
    })
}

pub fn endpoints_from_capability_statement(statement: &Value) -> Option<SmartEndpoints> {
    let rests = statement.get("rest")?.as_array()?;
    let oauth = rests
        .iter()
        .filter_map(|rest| rest.get("security")?.get("extension")?.as_array())
        .flatten()
        .find(|extension| {
            extension.get("url").and_then(Value::as_str) == Some(OAUTH_URIS_EXTENSION)
        })?;

    let mut authorize = None;
    let mut token = None;
    for extension in oauth.get("extension")?.as_array()? {
        let value = extension.get("valueUri").and_then(Value::as_str);
        match extension.get("url").and_then(Value::as_str) {
            Some("authorize") => authorize = value.map(str::to_string),
            Some("token") => token = value.map(str::to_string),
            _ => {}
        }
    }

    Some(SmartEndpoints {
        authorization_endpoint: authorize?,
        token_endpoint: token?,
    })
}

/// Authorization redirect URL with PKCE parameters.
pub fn authorization_url(
    endpoints: &SmartEndpoints,
    config: &SmartConfig,
    state: &str,
    pkce: &Pkce,
) -> Result<Url, FhirError> {
    let mut url = Url::parse(&endpoints.authorization_endpoint)?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("scope", &config.scope())
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("aud", &config.issuer)
        .append_pair("state", state)
        .append_pair("code_challenge", &pkce.challenge)
        .append_pair("code_challenge_method", Pkce::METHOD);
    Ok(url)
}

/// Discover endpoints, remember the pending authorization and return the redirect.
pub async fn authorize<S: Storage>(
    http: &reqwest::Client,
    config: &SmartConfig,
    storage: &S,
) -> Result<AuthorizationRequest, FhirError> {
    let endpoints = discover(http, &config.issuer).await?;
    let state = Uuid::new_v4().simple().to_string();
    let pkce = Pkce::generate();
    let url = authorization_url(&endpoints, config, &state, &pkce)?;

    let pending = PendingAuthorization {
        issuer: config.issuer.clone(),
        client_id: config.client_id.clone(),
        redirect_uri: config.redirect_uri.clone(),
        token_endpoint: endpoints.token_endpoint,
        code_verifier: pkce.verifier,
    };
    storage.set(
        &format!("{PENDING_STATE_PREFIX}{state}"),
        &serde_json::to_string(&pending)?,
    )?;

    info!(client_id = %config.client_id, "authorization redirect prepared");
    Ok(AuthorizationRequest { url, state })
}

/// Resolves the session from a redirect (token exchange) or from storage.
pub struct SmartLauncher<S> {
    http: reqwest::Client,
    storage: S,
    callback: Option<CallbackParams>,
}

impl<S: Storage> SmartLauncher<S> {
    pub fn new(http: reqwest::Client, storage: S) -> Self {
        Self {
            http,
            storage,
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: Option<CallbackParams>) -> Self {
        self.callback = callback;
        self
    }

    /// Stored session, dropping it when the token has expired.
    pub fn stored_session(&self) -> Result<Option<StoredSession>, FhirError> {
        let Some(raw) = self.storage.get(SESSION_STORAGE_KEY) else {
            return Ok(None);
        };
        let session: StoredSession = serde_json::from_str(&raw)?;
        if session.is_expired(Utc::now()) {
            warn!("stored SMART session expired");
            self.storage.remove(SESSION_STORAGE_KEY)?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn exchange(&self, params: &CallbackParams) -> Result<StoredSession, FhirError> {
        let pending_key = format!("{PENDING_STATE_PREFIX}{}", params.state);
        let raw = self
            .storage
            .get(&pending_key)
            .ok_or_else(|| FhirError::UnknownState(params.state.clone()))?;
        let pending: PendingAuthorization = serde_json::from_str(&raw)?;

        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "authorization_code")
            .append_pair("code", &params.code)
            .append_pair("redirect_uri", &pending.redirect_uri)
            .append_pair("client_id", &pending.client_id)
            .append_pair("code_verifier", &pending.code_verifier)
            .finish();

        debug!(endpoint = %pending.token_endpoint, "exchanging authorization code");
        let response = self
            .http
            .post(pending.token_endpoint.as_str())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(match response.json::<OAuthErrorBody>().await {
                Ok(body) => FhirError::Authorization {
                    error: body.error,
                    description: body.error_description.unwrap_or_default(),
                },
                Err(_) => FhirError::Status {
                    status: status.as_u16(),
                    url: pending.token_endpoint,
                },
            });
        }

        let token: TokenResponse = response.json().await?;
        self.storage.remove(&pending_key)?;

        let session = StoredSession::from_token(pending.issuer, token, Utc::now());
        self.storage
            .set(SESSION_STORAGE_KEY, &serde_json::to_string(&session)?)?;
        info!(has_patient = session.patient.is_some(), "SMART session established");
        Ok(session)
    }
}

impl<S: Storage> Launcher for SmartLauncher<S> {
    type Client = HttpFhirClient;

    async fn ready(&self) -> Result<HttpFhirClient, FhirError> {
        let session = match &self.callback {
            Some(params) => match self.exchange(params).await {
                // Reloading the callback page reuses the session from the first visit.
                Err(FhirError::UnknownState(state)) => self
                    .stored_session()?
                    .ok_or(FhirError::UnknownState(state))?,
                other => other?,
            },
            None => self.stored_session()?.ok_or(FhirError::NoSession)?,
        };

        HttpFhirClient::new(
            self.http.clone(),
            &session.issuer,
            session.access_token,
            session.patient,
        )
    }
}

async fn fetch_json(http: &reqwest::Client, url: &Url) -> Result<Value, FhirError> {
    let response = http
        .get(url.clone())
        .header(ACCEPT, "application/json")
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(FhirError::Status {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response.json().await?)
}
