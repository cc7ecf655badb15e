//! Giao diện wizard Epic EHR + ChatGPT cho môi trường WebAssembly.

pub mod config;

#[cfg(target_arch = "wasm32")]
mod app;
#[cfg(target_arch = "wasm32")]
mod browser;
#[cfg(target_arch = "wasm32")]
mod styles;

#[cfg(target_arch = "wasm32")]
pub use app::mount_app;

#[cfg(not(target_arch = "wasm32"))]
pub fn mount_app(_: &str, _: wasm_bindgen::JsValue) -> Result<(), wasm_bindgen::JsValue> {
    Err(wasm_bindgen::JsValue::from_str(
        "ehr-demo-ui chỉ hỗ trợ biên dịch target wasm32",
    ))
}
