//! Cấu hình truyền từ JavaScript khi mount ứng dụng.

use ehr_demo_core::{AppConfig, Environment};
use serde::Deserialize;

/// Cấu hình một phần; trường nào thiếu sẽ lấy giá trị mặc định của môi trường.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JsAppConfig {
    pub environment: Option<Environment>,
    pub issuer: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub chat_base_url: Option<String>,
    pub model: Option<String>,
}

impl From<JsAppConfig> for AppConfig {
    fn from(cfg: JsAppConfig) -> Self {
        let mut base = AppConfig::for_environment(cfg.environment.unwrap_or_default());
        if let Some(issuer) = cfg.issuer {
            base.smart.issuer = issuer;
        }
        if let Some(client_id) = cfg.client_id {
            base.smart.client_id = client_id;
        }
        if let Some(redirect_uri) = cfg.redirect_uri {
            base.smart.redirect_uri = redirect_uri;
        }
        if let Some(scopes) = cfg.scopes.filter(|scopes| !scopes.is_empty()) {
            base.smart.scopes = scopes;
        }
        if let Some(base_url) = cfg.chat_base_url {
            base.chat.base_url = base_url;
        }
        if let Some(model) = cfg.model {
            base.chat.model = model;
        }
        base
    }
}
