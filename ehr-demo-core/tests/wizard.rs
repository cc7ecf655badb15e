use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ehr_demo_core::{
    build_prompt, handle_callback, submit_key, ApiKeyStore, CallbackOutcome, DemoError, KeyForm, MemoryStorage,
    Patient, Resource, Route, SessionSource, Storage, SummaryRequest, Summarizer,
    WizardController, WizardEvent, WizardState, WizardStep, API_KEY_STORAGE_KEY, CALLBACK_ERROR,
    SUMMARY_PROMPT,
};
use serde_json::json;

#[derive(Clone)]
struct FakeSession {
    ready: Result<bool, DemoError>,
    reports: Vec<Resource>,
    report_calls: Rc<Cell<usize>>,
}

impl FakeSession {
    fn ready() -> Self {
        Self {
            ready: Ok(true),
            reports: vec![json!({"resourceType": "DiagnosticReport", "id": "xr-1"})],
            report_calls: Rc::new(Cell::new(0)),
        }
    }
}

impl SessionSource for FakeSession {
    async fn is_ready(&self) -> Result<bool, DemoError> {
        self.ready.clone()
    }

    async fn fetch_patient(&self) -> Result<Patient, DemoError> {
        Ok(Patient {
            id: "erXuFYUfucBZaryVksYEcMg3".to_string(),
            name: Some("Camila Lopez".to_string()),
            resource: json!({"resourceType": "Patient"}),
        })
    }

    async fn fetch_diagnostic_reports(&self) -> Result<Vec<Resource>, DemoError> {
        self.report_calls.set(self.report_calls.get() + 1);
        Ok(self.reports.clone())
    }
}

#[derive(Clone)]
struct FakeSummarizer {
    reply: Result<Option<String>, DemoError>,
    calls: Rc<Cell<usize>>,
    last: Rc<RefCell<Option<(String, SummaryRequest)>>>,
}

impl FakeSummarizer {
    fn replying(reply: Result<Option<String>, DemoError>) -> Self {
        Self {
            reply,
            calls: Rc::new(Cell::new(0)),
            last: Rc::new(RefCell::new(None)),
        }
    }
}

impl Summarizer for FakeSummarizer {
    async fn summarize(
        &self,
        api_key: &str,
        request: &SummaryRequest,
    ) -> Result<Option<String>, DemoError> {
        self.calls.set(self.calls.get() + 1);
        *self.last.borrow_mut() = Some((api_key.to_string(), request.clone()));
        self.reply.clone()
    }
}

fn controller(
    session: FakeSession,
    summarizer: FakeSummarizer,
    storage: MemoryStorage,
) -> WizardController<FakeSession, FakeSummarizer, MemoryStorage> {
    WizardController::new(session, summarizer, storage, "gpt-3.5-turbo")
}

#[tokio::test]
async fn fresh_load_without_stored_key_lands_on_key_step() {
    let summarizer = FakeSummarizer::replying(Ok(Some("ok".to_string())));
    let mut wizard = controller(FakeSession::ready(), summarizer.clone(), MemoryStorage::new());

    wizard.initial_load().await;

    let state = wizard.state();
    assert_eq!(state.current_step, WizardStep::ProvideKey);
    assert_eq!(state.patient_name(), Some("Camila Lopez"));
    assert!(!state.loading);
    assert_eq!(summarizer.calls.get(), 0);
}

#[tokio::test]
async fn stored_key_skips_form_and_queries() {
    let storage = MemoryStorage::new();
    storage.set(API_KEY_STORAGE_KEY, "sk-abc").unwrap();
    let summarizer = FakeSummarizer::replying(Ok(Some("No x-ray found.".to_string())));
    let mut wizard = controller(FakeSession::ready(), summarizer.clone(), storage);

    wizard.initial_load().await;

    assert_eq!(summarizer.calls.get(), 1);
    let (key, request) = summarizer.last.borrow().clone().unwrap();
    assert_eq!(key, "sk-abc");
    assert_eq!(request.model, "gpt-3.5-turbo");
    assert!(request.prompt.starts_with(SUMMARY_PROMPT));
    assert!(request.prompt.contains(r#""id":"xr-1""#));
    assert!(request.prompt.ends_with("}]"));

    let state = wizard.state();
    assert_eq!(state.current_step, WizardStep::Results);
    assert_eq!(state.summary.as_deref(), Some("No x-ray found."));
    assert!(!state.loading);
}

#[tokio::test]
async fn initial_load_runs_once() {
    let session = FakeSession::ready();
    let storage = MemoryStorage::new();
    storage.set(API_KEY_STORAGE_KEY, "sk-abc").unwrap();
    let summarizer = FakeSummarizer::replying(Ok(None));
    let mut wizard = controller(session.clone(), summarizer.clone(), storage);

    wizard.initial_load().await;
    wizard.initial_load().await;

    assert_eq!(summarizer.calls.get(), 1);
    assert_eq!(session.report_calls.get(), 1);
}

#[tokio::test]
async fn empty_message_keeps_query_step_and_does_not_retry() {
    let session = FakeSession::ready();
    let summarizer = FakeSummarizer::replying(Ok(None));
    let mut wizard = controller(session.clone(), summarizer.clone(), MemoryStorage::new());
    wizard.initial_load().await;

    wizard
        .submit_key(KeyForm {
            key: "sk-abc".to_string(),
            save: false,
        })
        .await;

    let state = wizard.state();
    assert_eq!(state.current_step, WizardStep::Query);
    assert_eq!(state.error.as_deref(), Some("no message from ChatGPT"));
    assert!(!state.loading);
    assert!(state.pending_query().is_none());

    assert!(!wizard.run_pending_query().await);
    assert_eq!(summarizer.calls.get(), 1);
}

#[tokio::test]
async fn summarizer_fault_is_surfaced_verbatim() {
    let summarizer =
        FakeSummarizer::replying(Err(DemoError::Chat("Incorrect API key provided".to_string())));
    let mut wizard = controller(FakeSession::ready(), summarizer, MemoryStorage::new());
    wizard.initial_load().await;
    wizard
        .submit_key(KeyForm {
            key: "sk-wrong".to_string(),
            save: false,
        })
        .await;

    assert_eq!(wizard.state().current_step, WizardStep::Query);
    assert_eq!(
        wizard.state().error.as_deref(),
        Some("Incorrect API key provided")
    );

    wizard.dismiss_error();
    assert!(wizard.state().error.is_none());
    assert_eq!(wizard.state().current_step, WizardStep::Query);
}

#[tokio::test]
async fn resubmitting_after_failure_retries() {
    let summarizer = FakeSummarizer::replying(Ok(Some(String::new())));
    let mut wizard = controller(FakeSession::ready(), summarizer.clone(), MemoryStorage::new());
    wizard.initial_load().await;

    let form = KeyForm {
        key: "sk-abc".to_string(),
        save: false,
    };
    wizard.submit_key(form.clone()).await;
    wizard.submit_key(form).await;

    assert_eq!(summarizer.calls.get(), 2);
}

#[test]
fn unsaved_key_leaves_storage_untouched() {
    let storage = MemoryStorage::new();
    let keys = ApiKeyStore::new(storage.clone());

    let event = submit_key(
        &keys,
        &KeyForm {
            key: "sk-abc".to_string(),
            save: false,
        },
    )
    .unwrap();

    assert_eq!(event, WizardEvent::KeySubmitted("sk-abc".to_string()));
    assert!(storage.is_empty());
}

#[test]
fn saved_key_is_persisted_exactly() {
    let storage = MemoryStorage::new();
    let keys = ApiKeyStore::new(storage.clone());

    submit_key(
        &keys,
        &KeyForm {
            key: " sk-abc".to_string(),
            save: true,
        },
    )
    .unwrap();

    assert_eq!(storage.get(API_KEY_STORAGE_KEY).as_deref(), Some(" sk-abc"));
    assert_eq!(storage.len(), 1);
}

#[test]
fn blank_key_is_rejected() {
    let keys = ApiKeyStore::new(MemoryStorage::new());
    let result = submit_key(
        &keys,
        &KeyForm {
            key: "   ".to_string(),
            save: true,
        },
    );
    assert_eq!(result, Err(DemoError::MissingApiKey));
    assert!(keys.load().is_none());
}

#[tokio::test]
async fn reset_clears_key_and_returns_to_key_step() {
    let storage = MemoryStorage::new();
    storage.set(API_KEY_STORAGE_KEY, "sk-abc").unwrap();
    let summarizer = FakeSummarizer::replying(Ok(Some("summary".to_string())));
    let mut wizard = controller(FakeSession::ready(), summarizer, storage.clone());
    wizard.initial_load().await;
    assert_eq!(wizard.state().current_step, WizardStep::Results);

    wizard.reset_key();

    let state = wizard.state();
    assert_eq!(state.current_step, WizardStep::ProvideKey);
    assert!(state.api_key.is_none());
    assert!(storage.get(API_KEY_STORAGE_KEY).is_none());
}

#[tokio::test]
async fn missing_session_leaves_sign_in_step() {
    let session = FakeSession {
        ready: Ok(false),
        ..FakeSession::ready()
    };
    let mut wizard = controller(
        session,
        FakeSummarizer::replying(Ok(None)),
        MemoryStorage::new(),
    );

    wizard.initial_load().await;

    let state = wizard.state();
    assert_eq!(state.current_step, WizardStep::SignIn);
    assert!(!state.loading);
    assert!(state.error.is_none());
}

#[test]
fn stale_query_result_is_ignored_after_reset() {
    let mut state = WizardState::default();
    state.apply(WizardEvent::KeySubmitted("sk-old".to_string()));
    state.apply(WizardEvent::QueryStarted("sk-old".to_string()));
    state.apply(WizardEvent::KeyReset);

    state.apply(WizardEvent::QueryFinished {
        key: "sk-old".to_string(),
        outcome: Ok("late summary".to_string()),
    });

    assert_eq!(state.current_step, WizardStep::ProvideKey);
    assert!(state.summary.is_none());
}

#[tokio::test]
async fn callback_redirects_only_when_ready() {
    assert_eq!(
        handle_callback(&FakeSession::ready()).await,
        CallbackOutcome::Redirect(Route::Wizard)
    );

    let not_ready = FakeSession {
        ready: Ok(false),
        ..FakeSession::ready()
    };
    assert_eq!(
        handle_callback(&not_ready).await,
        CallbackOutcome::Failed(CALLBACK_ERROR.to_string())
    );

    let broken = FakeSession {
        ready: Err(DemoError::Fhir("token exchange failed".to_string())),
        ..FakeSession::ready()
    };
    assert_eq!(
        handle_callback(&broken).await,
        CallbackOutcome::Failed(CALLBACK_ERROR.to_string())
    );
}

#[test]
fn prompt_template_is_sent_verbatim() {
    let prompt = build_prompt(&[json!({"id": "r1"})]).unwrap();
    assert_eq!(
        prompt,
        "what do my diagnositic reports include an xray? Here are my diagnostic reports: \
         [{\"id\":\"r1\"}]"
    );
}
