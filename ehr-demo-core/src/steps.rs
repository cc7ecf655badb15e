use serde::{Deserialize, Serialize};

/// Bốn bước tuyến tính của wizard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WizardStep {
    SignIn = 1,
    ProvideKey = 2,
    Query = 3,
    Results = 4,
}

impl WizardStep {
    pub const ALL: [WizardStep; 4] = [
        WizardStep::SignIn,
        WizardStep::ProvideKey,
        WizardStep::Query,
        WizardStep::Results,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.number() == value)
    }

    pub fn label(self) -> &'static str {
        match self {
            WizardStep::SignIn => "1. Sign In",
            WizardStep::ProvideKey => "2. Provide OpenAI Key",
            WizardStep::Query => "3. Query ChatGPT",
            WizardStep::Results => "4. Results",
        }
    }
}

/// Trạng thái hiển thị của một bước trong danh sách.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Completed,
    Active,
    Upcoming,
}

/// Nội dung khung chi tiết của một bước.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailView {
    Hidden,
    Spinner,
    Content,
}

pub fn step_status(step: WizardStep, current: WizardStep) -> StepStatus {
    if current > step {
        StepStatus::Completed
    } else if current == step {
        StepStatus::Active
    } else {
        StepStatus::Upcoming
    }
}

/// Chỉ bước đang hoạt động có khung chi tiết; khi đang tải thì thay bằng spinner.
pub fn detail_view(step: WizardStep, current: WizardStep, loading: bool) -> DetailView {
    match (step == current, loading) {
        (false, _) => DetailView::Hidden,
        (true, true) => DetailView::Spinner,
        (true, false) => DetailView::Content,
    }
}
