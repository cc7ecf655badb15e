use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    detail_view, step_status, ApiKeyStore, DemoError, DetailView, Patient, Resource,
    SessionSource, StepStatus, Storage, SummaryRequest, Summarizer, WizardStep,
};

/// Câu hỏi cố định gửi cho ChatGPT, danh sách report được nối phía sau.
pub const SUMMARY_PROMPT: &str =
    "what do my diagnositic reports include an xray? Here are my diagnostic reports: ";

/// Thông báo cố định khi trang callback không khởi tạo được phiên.
pub const CALLBACK_ERROR: &str = "Unable to initialize Epic user session";

/// Ghép prompt với danh sách report đã serialize JSON.
pub fn build_prompt(reports: &[Resource]) -> Result<String, DemoError> {
    let payload = serde_json::to_string(reports)?;
    Ok(format!("{SUMMARY_PROMPT}{payload}"))
}

/// Dữ liệu form nhập key ở bước 2.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyForm {
    pub key: String,
    pub save: bool,
}

/// Kết quả một lần truy vấn ChatGPT.
pub type QueryOutcome = Result<String, DemoError>;

/// Sự kiện làm thay đổi trạng thái wizard.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardEvent {
    PatientLoaded {
        patient: Patient,
        stored_key: Option<String>,
    },
    /// Lần tải đầu thất bại: chỉ tắt loading, giữ nguyên bước.
    LoadFailed,
    KeySubmitted(String),
    QueryStarted(String),
    QueryFinished {
        key: String,
        outcome: QueryOutcome,
    },
    KeyReset,
    ErrorRaised(String),
    ErrorDismissed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WizardState {
    pub current_step: WizardStep,
    pub loading: bool,
    pub api_key: Option<String>,
    pub patient: Option<Patient>,
    pub summary: Option<String>,
    pub error: Option<String>,
    /// Key của lần truy vấn gần nhất, chặn việc tự động chạy lại sau khi lỗi.
    pub attempted_key: Option<String>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            current_step: WizardStep::SignIn,
            loading: true,
            api_key: None,
            patient: None,
            summary: None,
            error: None,
            attempted_key: None,
        }
    }
}

impl WizardState {
    pub fn apply(&mut self, event: WizardEvent) {
        match event {
            WizardEvent::PatientLoaded {
                patient,
                stored_key,
            } => {
                self.patient = Some(patient);
                self.current_step = WizardStep::ProvideKey;
                if let Some(key) = stored_key.filter(|key| !key.is_empty()) {
                    self.api_key = Some(key);
                    self.attempted_key = None;
                    self.current_step = WizardStep::Query;
                }
                self.loading = false;
            }
            WizardEvent::LoadFailed => {
                self.loading = false;
            }
            WizardEvent::KeySubmitted(key) => {
                self.api_key = Some(key);
                self.attempted_key = None;
                self.current_step = WizardStep::Query;
            }
            WizardEvent::QueryStarted(key) => {
                self.attempted_key = Some(key);
                self.loading = true;
            }
            WizardEvent::QueryFinished { key, outcome } => {
                // Kết quả của key đã bị reset hoặc thay thế thì bỏ qua.
                if self.attempted_key.as_deref() != Some(key.as_str()) {
                    return;
                }
                match outcome {
                    Ok(summary) => {
                        self.summary = Some(summary);
                        self.current_step = WizardStep::Results;
                    }
                    Err(err) => {
                        self.error = Some(err.to_string());
                    }
                }
                self.loading = false;
            }
            WizardEvent::KeyReset => {
                self.api_key = None;
                self.attempted_key = None;
                self.summary = None;
                self.loading = false;
                self.current_step = WizardStep::ProvideKey;
            }
            WizardEvent::ErrorRaised(message) => {
                self.error = Some(message);
                self.loading = false;
            }
            WizardEvent::ErrorDismissed => {
                self.error = None;
            }
        }
    }

    /// Key cần truy vấn tiếp theo: đã có key, chưa có tóm tắt và chưa thử key này.
    pub fn pending_query(&self) -> Option<&str> {
        if self.current_step != WizardStep::Query || self.summary.is_some() {
            return None;
        }
        let key = self.api_key.as_deref()?;
        if self.attempted_key.as_deref() == Some(key) {
            return None;
        }
        Some(key)
    }

    pub fn status_of(&self, step: WizardStep) -> StepStatus {
        step_status(step, self.current_step)
    }

    pub fn detail_of(&self, step: WizardStep) -> DetailView {
        detail_view(step, self.current_step, self.loading)
    }

    pub fn patient_name(&self) -> Option<&str> {
        self.patient.as_ref()?.name.as_deref()
    }
}

/// Trình tự tải ban đầu: giải quyết phiên, đọc bệnh nhân, kiểm tra key đã lưu.
pub async fn load_session<S, K>(
    session: &S,
    keys: &ApiKeyStore<K>,
) -> Result<WizardEvent, DemoError>
where
    S: SessionSource,
    K: Storage,
{
    if !session.is_ready().await? {
        return Err(DemoError::NoSession);
    }
    let patient = session.fetch_patient().await?;
    info!(patient_id = %patient.id, "patient loaded");
    Ok(WizardEvent::PatientLoaded {
        patient,
        stored_key: keys.load(),
    })
}

/// Xử lý form key; chỉ ghi vào storage khi người dùng chọn lưu.
pub fn submit_key<K: Storage>(
    keys: &ApiKeyStore<K>,
    form: &KeyForm,
) -> Result<WizardEvent, DemoError> {
    if form.key.trim().is_empty() {
        return Err(DemoError::MissingApiKey);
    }
    if form.save {
        keys.save(&form.key)?;
    }
    Ok(WizardEvent::KeySubmitted(form.key.clone()))
}

pub fn reset_key<K: Storage>(keys: &ApiKeyStore<K>) -> Result<WizardEvent, DemoError> {
    keys.clear()?;
    Ok(WizardEvent::KeyReset)
}

/// Lấy DiagnosticReport rồi nhờ mô hình ngôn ngữ tóm tắt.
pub async fn summarize_reports<S, M>(
    session: &S,
    summarizer: &M,
    model: &str,
    api_key: &str,
) -> Result<String, DemoError>
where
    S: SessionSource,
    M: Summarizer,
{
    if api_key.trim().is_empty() {
        return Err(DemoError::MissingApiKey);
    }
    let reports = session.fetch_diagnostic_reports().await?;
    debug!(count = reports.len(), "diagnostic reports fetched");

    let request = SummaryRequest {
        model: model.to_string(),
        prompt: build_prompt(&reports)?,
    };
    summarizer
        .summarize(api_key, &request)
        .await?
        .filter(|message| !message.is_empty())
        .ok_or(DemoError::EmptySummary)
}

/// Hai route của ứng dụng.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Wizard,
    Callback,
}

impl Route {
    pub fn from_path(path: &str) -> Self {
        if path.trim_end_matches('/').ends_with("/callback") {
            Route::Callback
        } else {
            Route::Wizard
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Route::Wizard => "/",
            Route::Callback => "/callback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Redirect(Route),
    Failed(String),
}

/// Trang callback: phiên sẵn sàng thì chuyển về wizard, ngược lại báo lỗi cố định.
pub async fn handle_callback<S: SessionSource>(session: &S) -> CallbackOutcome {
    match session.is_ready().await {
        Ok(true) => CallbackOutcome::Redirect(Route::Wizard),
        Ok(false) => {
            warn!("callback completed without a patient in context");
            CallbackOutcome::Failed(CALLBACK_ERROR.to_string())
        }
        Err(err) => {
            warn!(error = %err, "callback session initialization failed");
            CallbackOutcome::Failed(CALLBACK_ERROR.to_string())
        }
    }
}

/// Điều khiển wizard không phụ thuộc UI (CLI, test).
pub struct WizardController<S, M, K> {
    session: S,
    summarizer: M,
    keys: ApiKeyStore<K>,
    model: String,
    state: WizardState,
    loaded: bool,
}

impl<S, M, K> WizardController<S, M, K>
where
    S: SessionSource,
    M: Summarizer,
    K: Storage,
{
    pub fn new(session: S, summarizer: M, storage: K, model: impl Into<String>) -> Self {
        Self {
            session,
            summarizer,
            keys: ApiKeyStore::new(storage),
            model: model.into(),
            state: WizardState::default(),
            loaded: false,
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn keys(&self) -> &ApiKeyStore<K> {
        &self.keys
    }

    /// Chạy đúng một lần; nếu có key đã lưu thì truy vấn luôn.
    pub async fn initial_load(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;

        match load_session(&self.session, &self.keys).await {
            Ok(event) => self.state.apply(event),
            Err(err) => {
                warn!(error = %err, "initial load failed");
                self.state.apply(WizardEvent::LoadFailed);
            }
        }
        self.run_pending_query().await;
    }

    pub async fn submit_key(&mut self, form: KeyForm) {
        match submit_key(&self.keys, &form) {
            Ok(event) => self.state.apply(event),
            Err(err) => {
                self.state.apply(WizardEvent::ErrorRaised(err.to_string()));
                return;
            }
        }
        self.run_pending_query().await;
    }

    /// Truy vấn nếu điều kiện chặn lặp cho phép; trả về `true` nếu đã chạy.
    pub async fn run_pending_query(&mut self) -> bool {
        let Some(key) = self.state.pending_query().map(str::to_owned) else {
            return false;
        };
        self.state.apply(WizardEvent::QueryStarted(key.clone()));

        let outcome = summarize_reports(&self.session, &self.summarizer, &self.model, &key).await;
        if let Err(err) = &outcome {
            error!(error = %err, "summarization failed");
        }
        self.state.apply(WizardEvent::QueryFinished { key, outcome });
        true
    }

    pub fn reset_key(&mut self) {
        match reset_key(&self.keys) {
            Ok(event) => self.state.apply(event),
            Err(err) => self.state.apply(WizardEvent::ErrorRaised(err.to_string())),
        }
    }

    pub fn dismiss_error(&mut self) {
        self.state.apply(WizardEvent::ErrorDismissed);
    }
}
