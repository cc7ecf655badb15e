//! SMART on FHIR session client for the Epic sandbox.
//!
//! Covers the authorization-code launch (discovery, PKCE, token exchange),
//! a lazily resolved session and the two reads the wizard needs.

mod client;
mod error;
mod launch;
mod pkce;
mod session;

use ehr_demo_core::{Patient, Resource};
use serde_json::Value;

pub use client::{FhirClient, HttpFhirClient};
pub use error::FhirError;
pub use launch::{
    authorization_url, authorize, discover, endpoints_from_capability_statement,
    AuthorizationRequest, CallbackParams, SmartEndpoints, SmartLauncher, StoredSession,
    TokenResponse, PENDING_STATE_PREFIX, SESSION_STORAGE_KEY,
};
pub use pkce::Pkce;
pub use session::{Launcher, SessionClient};

/// Unwrap `entry[].resource` from a search bundle, keeping server order.
pub fn unwrap_bundle_entries(bundle: &Value) -> Result<Vec<Resource>, FhirError> {
    let bundle_type = bundle
        .get("resourceType")
        .and_then(Value::as_str)
        .ok_or_else(|| FhirError::Payload("missing resourceType".to_string()))?;

    if bundle_type != "Bundle" {
        return Err(FhirError::Payload(format!(
            "Expected resourceType Bundle, received {bundle_type}"
        )));
    }

    let Some(entries) = bundle.get("entry").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    Ok(entries
        .iter()
        .filter_map(|entry| entry.get("resource").cloned())
        .collect())
}

/// Build a [`Patient`] from a `Patient/{id}` read.
pub fn patient_from_resource(id: &str, resource: Value) -> Result<Patient, FhirError> {
    match resource.get("resourceType").and_then(Value::as_str) {
        Some("Patient") => {}
        Some(other) => {
            return Err(FhirError::Payload(format!(
                "Expected resourceType Patient, received {other}"
            )))
        }
        None => return Err(FhirError::Payload("missing resourceType".to_string())),
    }

    let id = resource
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or(id)
        .to_string();

    Ok(Patient {
        id,
        name: extract_patient_name(&resource),
        resource,
    })
}

fn extract_patient_name(resource: &Value) -> Option<String> {
    let names = resource.get("name")?.as_array()?;
    let name = names.first()?;

    if let Some(text) = name.get("text").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            return Some(text.trim().to_string());
        }
    }

    let given = name
        .get("given")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .and_then(Value::as_str)
        .unwrap_or("");
    let family = name.get("family").and_then(Value::as_str).unwrap_or("");
    let full = format!("{given} {family}").trim().to_string();
    if full.is_empty() {
        None
    } else {
        Some(full)
    }
}
