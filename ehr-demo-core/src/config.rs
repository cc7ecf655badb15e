use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// FHIR base URL của sandbox Epic (R4).
pub const EPIC_ISSUER: &str = "https://fhir.epic.com/interconnect-fhir-oauth/api/FHIR/R4/";

/// Scope SMART yêu cầu khi đăng nhập.
pub const DEFAULT_SCOPES: [&str; 4] = [
    "patient/Patient.read",
    "patient/Condition.read",
    "patient/AllergyIntolerance.read",
    "patient/launch",
];

const LOCAL_CLIENT_ID: &str = "1aea8201-9c37-4258-b682-b13f4d62c536";
const LOCAL_REDIRECT_URI: &str = "http://localhost:3000/callback";
const DEPLOYED_CLIENT_ID: &str = "924ab79c-c9c4-4176-901c-707b44728f09";
const DEPLOYED_REDIRECT_URI: &str = "https://epic-ehr-demo.netlify.app/callback";

/// Môi trường triển khai, quyết định cặp client id / redirect URI.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Local,
    Deployed,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "deployed" | "production" => Ok(Environment::Deployed),
            other => Err(format!("unknown environment `{other}`")),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Local => f.write_str("local"),
            Environment::Deployed => f.write_str("deployed"),
        }
    }
}

/// Cấu hình đăng nhập SMART on FHIR, chọn một lần khi khởi động.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmartConfig {
    pub issuer: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl SmartConfig {
    pub fn for_environment(environment: Environment) -> Self {
        let (client_id, redirect_uri) = match environment {
            Environment::Local => (LOCAL_CLIENT_ID, LOCAL_REDIRECT_URI),
            Environment::Deployed => (DEPLOYED_CLIENT_ID, DEPLOYED_REDIRECT_URI),
        };
        Self {
            issuer: EPIC_ISSUER.to_string(),
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|scope| scope.to_string()).collect(),
        }
    }

    /// Chuỗi scope phân tách bằng khoảng trắng, đúng định dạng OAuth.
    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }
}

impl Default for SmartConfig {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

/// Cấu hình dịch vụ chat completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub environment: Environment,
    pub smart: SmartConfig,
    pub chat: ChatConfig,
}

impl AppConfig {
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            smart: SmartConfig::for_environment(environment),
            chat: ChatConfig::default(),
        }
    }
}
