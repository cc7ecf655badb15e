use ehr_demo_core::{DemoError, Patient, Resource, SessionSource};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::client::encode_component;
use crate::{patient_from_resource, unwrap_bundle_entries, FhirClient, FhirError};

/// Produces an authorized client once the OAuth redirect has completed.
#[allow(async_fn_in_trait)]
pub trait Launcher {
    type Client: FhirClient;

    async fn ready(&self) -> Result<Self::Client, FhirError>;
}

/// Lazily resolved SMART session.
///
/// The first caller drives [`Launcher::ready`]; concurrent callers wait on the
/// same initialization. A failed resolution is not cached.
pub struct SessionClient<L: Launcher> {
    launcher: L,
    client: OnceCell<L::Client>,
}

impl<L: Launcher> SessionClient<L> {
    pub fn new(launcher: L) -> Self {
        Self {
            launcher,
            client: OnceCell::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.client.initialized()
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub async fn client(&self) -> Result<&L::Client, FhirError> {
        self.client
            .get_or_try_init(|| async {
                debug!("resolving SMART session");
                self.launcher.ready().await
            })
            .await
    }

    async fn patient_id(&self) -> Result<(&L::Client, String), FhirError> {
        let client = self.client().await?;
        let id = client.patient_id().ok_or(FhirError::NoSession)?.to_string();
        Ok((client, id))
    }
}

impl<L: Launcher> SessionSource for SessionClient<L> {
    async fn is_ready(&self) -> Result<bool, DemoError> {
        let client = self.client().await?;
        Ok(client.patient_id().is_some())
    }

    async fn fetch_patient(&self) -> Result<Patient, DemoError> {
        let (client, id) = self.patient_id().await?;
        let resource = client
            .request(&format!("Patient/{}", encode_component(&id)))
            .await?;
        Ok(patient_from_resource(&id, resource)?)
    }

    async fn fetch_diagnostic_reports(&self) -> Result<Vec<Resource>, DemoError> {
        let (client, id) = self.patient_id().await?;
        let bundle = client
            .request(&format!("DiagnosticReport?patient={}", encode_component(&id)))
            .await?;
        Ok(unwrap_bundle_entries(&bundle)?)
    }
}
