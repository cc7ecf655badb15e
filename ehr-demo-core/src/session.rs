use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::DemoError;

/// Resource FHIR thô, giữ nguyên JSON server trả về.
pub type Resource = Value;

/// Bệnh nhân của phiên hiện tại.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: String,
    /// `name[0].text` nếu server có trả về.
    pub name: Option<String>,
    pub resource: Resource,
}

/// Phiên làm việc với server hồ sơ sức khỏe.
///
/// Cài đặt phải giải quyết phiên đã ủy quyền tối đa một lần rồi tái sử dụng.
#[allow(async_fn_in_trait)]
pub trait SessionSource {
    /// Phiên đã sẵn sàng và có bệnh nhân trong launch context hay chưa.
    async fn is_ready(&self) -> Result<bool, DemoError>;
    async fn fetch_patient(&self) -> Result<Patient, DemoError>;
    /// Danh sách DiagnosticReport của bệnh nhân, theo thứ tự server trả về.
    async fn fetch_diagnostic_reports(&self) -> Result<Vec<Resource>, DemoError>;
}

/// Yêu cầu tóm tắt gửi tới mô hình ngôn ngữ.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryRequest {
    pub model: String,
    pub prompt: String,
}

#[allow(async_fn_in_trait)]
pub trait Summarizer {
    /// Trả về nội dung message của lựa chọn đầu tiên, `None` nếu không có.
    async fn summarize(
        &self,
        api_key: &str,
        request: &SummaryRequest,
    ) -> Result<Option<String>, DemoError>;
}
