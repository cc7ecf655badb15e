//! Logic lõi của wizard: đăng nhập Epic, nhập key OpenAI, truy vấn và hiển thị kết quả.
//!
//! Crate này không phụ thuộc vào trình duyệt hay HTTP. Các thành phần bên ngoài
//! (phiên FHIR, dịch vụ tóm tắt, bộ lưu trữ key) được trừu tượng hóa qua trait
//! để UI wasm, CLI và test dùng chung một máy trạng thái.

mod config;
mod error;
mod session;
mod steps;
mod storage;
mod wizard;

pub use config::{AppConfig, ChatConfig, Environment, SmartConfig, DEFAULT_SCOPES, EPIC_ISSUER};
pub use error::DemoError;
pub use session::{Patient, Resource, SessionSource, SummaryRequest, Summarizer};
pub use steps::{detail_view, step_status, DetailView, StepStatus, WizardStep};
pub use storage::{ApiKeyStore, MemoryStorage, Storage, API_KEY_STORAGE_KEY};
pub use wizard::{
    build_prompt, handle_callback, load_session, reset_key, submit_key, summarize_reports,
    CallbackOutcome, KeyForm, QueryOutcome, Route, WizardController, WizardEvent, WizardState,
    CALLBACK_ERROR, SUMMARY_PROMPT,
};
