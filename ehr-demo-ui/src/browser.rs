use ehr_demo_core::{ApiKeyStore, DemoError, Storage};
use wasm_bindgen::JsValue;
use web_sys::Window;

/// `localStorage` hoặc `sessionStorage` của trình duyệt.
#[derive(Clone)]
pub struct BrowserStorage {
    inner: web_sys::Storage,
}

impl BrowserStorage {
    pub fn local() -> Result<Self, DemoError> {
        let inner = window()?
            .local_storage()
            .map_err(js_error)?
            .ok_or_else(|| DemoError::Storage("localStorage không khả dụng".to_string()))?;
        Ok(Self { inner })
    }

    pub fn session() -> Result<Self, DemoError> {
        let inner = window()?
            .session_storage()
            .map_err(js_error)?
            .ok_or_else(|| DemoError::Storage("sessionStorage không khả dụng".to_string()))?;
        Ok(Self { inner })
    }
}

impl Storage for BrowserStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DemoError> {
        self.inner
            .set_item(key, value)
            .map_err(|err| DemoError::Storage(format!("{err:?}")))
    }

    fn remove(&self, key: &str) -> Result<(), DemoError> {
        self.inner
            .remove_item(key)
            .map_err(|err| DemoError::Storage(format!("{err:?}")))
    }
}

/// OpenAI key nằm trong local storage để còn sau khi đóng tab.
pub fn key_store() -> Result<ApiKeyStore<BrowserStorage>, DemoError> {
    BrowserStorage::local().map(ApiKeyStore::new)
}

pub fn current_path() -> String {
    web_sys::window()
        .and_then(|window| window.location().pathname().ok())
        .unwrap_or_default()
}

pub fn current_href() -> Result<String, DemoError> {
    window()?.location().href().map_err(js_error)
}

pub fn navigate(url: &str) -> Result<(), DemoError> {
    window()?.location().set_href(url).map_err(js_error)
}

pub fn js_error(err: JsValue) -> DemoError {
    DemoError::Other(
        err.as_string()
            .unwrap_or_else(|| format!("{err:?}")),
    )
}

fn window() -> Result<Window, DemoError> {
    web_sys::window().ok_or_else(|| DemoError::Other("Không có window".to_string()))
}
