use std::collections::HashMap;
use std::fs;

use chrono::{Duration, TimeZone, Utc};
use ehr_demo_core::{Environment, MemoryStorage, SessionSource, SmartConfig, Storage};
use ehr_demo_fhir::{
    authorization_url, endpoints_from_capability_statement, CallbackParams, FhirError, Launcher,
    Pkce, SessionClient, SmartEndpoints, SmartLauncher, StoredSession, TokenResponse,
    SESSION_STORAGE_KEY,
};
use serde_json::Value;

fn fixture(name: &str) -> Value {
    let path = format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"));
    serde_json::from_str(&fs::read_to_string(path).expect("Không đọc được fixture"))
        .expect("Fixture không hợp lệ")
}

fn epic_endpoints() -> SmartEndpoints {
    SmartEndpoints {
        authorization_endpoint: "https://fhir.epic.com/interconnect-fhir-oauth/oauth2/authorize"
            .to_string(),
        token_endpoint: "https://fhir.epic.com/interconnect-fhir-oauth/oauth2/token".to_string(),
    }
}

#[test]
fn pkce_matches_rfc7636_example() {
    let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
    assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
}

#[test]
fn generated_verifier_has_valid_length() {
    let pkce = Pkce::generate();
    assert!((43..=128).contains(&pkce.verifier.len()));
    assert_ne!(pkce.verifier, Pkce::generate().verifier);
}

#[test]
fn authorization_url_carries_launch_parameters() {
    let config = SmartConfig::for_environment(Environment::Deployed);
    let pkce = Pkce::from_verifier("verifier-verifier-verifier-verifier-verifier");
    let url = authorization_url(&epic_endpoints(), &config, "state-123", &pkce).unwrap();

    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    assert_eq!(params["response_type"], "code");
    assert_eq!(params["client_id"], "924ab79c-c9c4-4176-901c-707b44728f09");
    assert_eq!(
        params["redirect_uri"],
        "https://epic-ehr-demo.netlify.app/callback"
    );
    assert_eq!(
        params["scope"],
        "patient/Patient.read patient/Condition.read patient/AllergyIntolerance.read patient/launch"
    );
    assert_eq!(params["aud"], config.issuer);
    assert_eq!(params["state"], "state-123");
    assert_eq!(params["code_challenge"], pkce.challenge);
    assert_eq!(params["code_challenge_method"], "S256");
    assert!(url.as_str().starts_with(&epic_endpoints().authorization_endpoint));
}

#[test]
fn local_environment_uses_localhost_redirect() {
    let config = SmartConfig::for_environment(Environment::Local);
    assert_eq!(config.client_id, "1aea8201-9c37-4258-b682-b13f4d62c536");
    assert_eq!(config.redirect_uri, "http://localhost:3000/callback");
}

#[test]
fn capability_statement_yields_oauth_endpoints() {
    let endpoints =
        endpoints_from_capability_statement(&fixture("capability_statement.json")).unwrap();
    assert_eq!(endpoints, epic_endpoints());
}

#[test]
fn capability_statement_without_security_yields_nothing() {
    let statement = serde_json::json!({"resourceType": "CapabilityStatement", "rest": [{"mode": "server"}]});
    assert!(endpoints_from_capability_statement(&statement).is_none());
}

#[test]
fn callback_params_are_read_from_redirect() {
    let params =
        CallbackParams::from_href("http://localhost:3000/callback?code=abc%2F1&state=xyz")
            .unwrap()
            .unwrap();
    assert_eq!(params.code, "abc/1");
    assert_eq!(params.state, "xyz");

    assert!(CallbackParams::from_href("http://localhost:3000/callback")
        .unwrap()
        .is_none());
}

#[test]
fn callback_error_is_reported() {
    let result = CallbackParams::from_href(
        "http://localhost:3000/callback?error=access_denied&error_description=User+declined",
    );
    match result {
        Err(FhirError::Authorization { error, description }) => {
            assert_eq!(error, "access_denied");
            assert_eq!(description, "User declined");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn token_expiry_is_tracked() {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let token: TokenResponse = serde_json::from_str(
        r#"{"access_token":"tok","token_type":"Bearer","expires_in":3600,"scope":"patient/Patient.read","patient":"p1"}"#,
    )
    .unwrap();

    let session = StoredSession::from_token("https://example.org/fhir/".to_string(), token, now);

    assert_eq!(session.patient.as_deref(), Some("p1"));
    assert!(!session.is_expired(now + Duration::minutes(59)));
    assert!(session.is_expired(now + Duration::hours(1)));
}

#[test]
fn out_of_range_token_lifetime_means_no_expiry() {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let token: TokenResponse = serde_json::from_str(
        r#"{"access_token":"tok","expires_in":9223372036854775807,"patient":"p1"}"#,
    )
    .unwrap();

    let session = StoredSession::from_token("https://example.org/fhir/".to_string(), token, now);

    assert_eq!(session.expires_at, None);
    assert!(!session.is_expired(now + Duration::days(365)));
}

#[test]
fn negative_token_lifetime_is_already_expired() {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let token: TokenResponse =
        serde_json::from_str(r#"{"access_token":"tok","expires_in":-30}"#).unwrap();

    let session = StoredSession::from_token("https://example.org/fhir/".to_string(), token, now);
    assert!(session.is_expired(now));
}

#[tokio::test]
async fn stored_session_resolves_without_redirect() {
    let storage = MemoryStorage::new();
    let session = StoredSession {
        issuer: "https://example.org/fhir".to_string(),
        access_token: "tok".to_string(),
        patient: Some("p1".to_string()),
        expires_at: None,
    };
    storage
        .set(SESSION_STORAGE_KEY, &serde_json::to_string(&session).unwrap())
        .unwrap();

    let launcher = SmartLauncher::new(reqwest::Client::new(), storage);
    let client = launcher.ready().await.unwrap();
    assert_eq!(client.base_url().as_str(), "https://example.org/fhir/");

    let session = SessionClient::new(SmartLauncher::new(
        reqwest::Client::new(),
        launcher_storage_with(&session),
    ));
    assert!(session.is_ready().await.unwrap());
}

#[tokio::test]
async fn expired_session_is_discarded() {
    let storage = MemoryStorage::new();
    let expired = StoredSession {
        issuer: "https://example.org/fhir/".to_string(),
        access_token: "tok".to_string(),
        patient: Some("p1".to_string()),
        expires_at: Some(Utc::now() - Duration::minutes(5)),
    };
    storage
        .set(SESSION_STORAGE_KEY, &serde_json::to_string(&expired).unwrap())
        .unwrap();

    let launcher = SmartLauncher::new(reqwest::Client::new(), storage.clone());
    assert!(matches!(launcher.ready().await, Err(FhirError::NoSession)));
    assert!(storage.get(SESSION_STORAGE_KEY).is_none());
}

#[tokio::test]
async fn unknown_state_without_session_fails() {
    let launcher = SmartLauncher::new(reqwest::Client::new(), MemoryStorage::new())
        .with_callback(Some(CallbackParams {
            code: "abc".to_string(),
            state: "never-issued".to_string(),
        }));

    match launcher.ready().await {
        Err(FhirError::UnknownState(state)) => assert_eq!(state, "never-issued"),
        other => panic!("unexpected result: {other:?}"),
    }
}

fn launcher_storage_with(session: &StoredSession) -> MemoryStorage {
    let storage = MemoryStorage::new();
    storage
        .set(SESSION_STORAGE_KEY, &serde_json::to_string(session).unwrap())
        .unwrap();
    storage
}
