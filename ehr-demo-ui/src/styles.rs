#![cfg(target_arch = "wasm32")]

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Node};

const STYLE_TAG_SELECTOR: &str = "style[data-ehr-demo-ui]";

/// Default layout for the wizard, with design tokens that can be overridden.
pub const DEFAULT_STYLES: &str = r#"
:root {
  --ehr-font-family: 'Inter', system-ui, -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
  --ehr-bg: #ffffff;
  --ehr-text: #111827;
  --ehr-muted: #4b5563;
  --ehr-radius: 8px;
  --ehr-card-border: #e5e7eb;
  --ehr-completed-bg: #f0fdf4;
  --ehr-completed-border: #86efac;
  --ehr-completed-text: #15803d;
  --ehr-active-bg: #dbeafe;
  --ehr-active-border: #93c5fd;
  --ehr-active-text: #1d4ed8;
  --ehr-upcoming-bg: #f3f4f6;
  --ehr-upcoming-border: #d1d5db;
  --ehr-error-bg: #fdf2f2;
  --ehr-error-text: #9b1c1c;
  --ehr-button-bg: #1d4ed8;
  --ehr-button-text: #ffffff;
}

.ehr-demo {
  font-family: var(--ehr-font-family);
  background: var(--ehr-bg);
  color: var(--ehr-text);
  min-height: 100vh;
  display: flex;
  flex-direction: column;
  align-items: center;
  justify-content: center;
  gap: 8px;
}

.wizard-root {
  width: 100%;
  max-width: 1100px;
  padding: 0 16px;
}

.wizard-header h1 {
  text-align: center;
  font-size: 1.5rem;
}

.wizard-grid {
  margin-top: 32px;
  display: grid;
  grid-template-columns: 1fr 2fr;
  gap: 16px;
}

.step-list {
  list-style: none;
  margin: 0;
  padding: 0;
  display: flex;
  flex-direction: column;
  gap: 16px;
}

.step-item {
  display: flex;
  align-items: center;
  justify-content: space-between;
  padding: 16px;
  border-radius: var(--ehr-radius);
  border: 1px solid var(--ehr-upcoming-border);
  background: var(--ehr-upcoming-bg);
}

.step-item h3 {
  margin: 0;
  font-size: 1rem;
  font-weight: 500;
}

.step-item.is-completed {
  border-color: var(--ehr-completed-border);
  background: var(--ehr-completed-bg);
  color: var(--ehr-completed-text);
}

.step-item.is-active {
  border-color: var(--ehr-active-border);
  background: var(--ehr-active-bg);
  color: var(--ehr-active-text);
}

.step-card {
  border: 1px solid var(--ehr-card-border);
  border-radius: var(--ehr-radius);
  padding: 24px;
  display: flex;
  flex-direction: column;
  gap: 16px;
  box-shadow: 0 1px 3px rgba(0, 0, 0, 0.08);
}

.step-card h5 {
  margin: 0;
  font-size: 1.25rem;
  font-weight: 700;
}

.step-loading {
  min-height: 160px;
  align-items: center;
  justify-content: center;
}

.step-centered {
  display: flex;
  flex-direction: column;
  align-items: center;
  gap: 16px;
}

.step-prompt,
.step-result {
  font-size: 0.875rem;
  color: var(--ehr-muted);
  white-space: pre-wrap;
}

.key-form {
  display: flex;
  flex-direction: column;
  gap: 12px;
}

.key-form input[type="password"] {
  padding: 10px;
  border-radius: var(--ehr-radius);
  border: 1px solid var(--ehr-upcoming-border);
}

.checkbox-row {
  display: flex;
  align-items: center;
  gap: 8px;
}

.button {
  border: none;
  border-radius: var(--ehr-radius);
  padding: 10px 16px;
  background: var(--ehr-button-bg);
  color: var(--ehr-button-text);
  cursor: pointer;
}

.button:disabled {
  opacity: 0.6;
  cursor: progress;
}

.button-secondary {
  background: transparent;
  color: var(--ehr-button-bg);
  border: 1px solid var(--ehr-button-bg);
}

.alert {
  display: flex;
  align-items: center;
  gap: 8px;
  padding: 16px;
  border-radius: var(--ehr-radius);
  background: var(--ehr-error-bg);
  color: var(--ehr-error-text);
}

.alert-title {
  font-weight: 600;
}

.alert-message {
  flex: 1;
}

.alert-dismiss {
  border: none;
  background: transparent;
  color: inherit;
  font-size: 1.25rem;
  cursor: pointer;
}

.spinner {
  width: 24px;
  height: 24px;
  border-radius: 50%;
  border: 3px solid var(--ehr-upcoming-border);
  border-top-color: var(--ehr-button-bg);
  animation: ehr-spin 0.8s linear infinite;
}

.spinner-xl {
  width: 48px;
  height: 48px;
}

@keyframes ehr-spin {
  to {
    transform: rotate(360deg);
  }
}

@media (max-width: 768px) {
  .wizard-grid {
    grid-template-columns: 1fr;
  }
}
"#;

pub fn ensure_styles(document: &Document) -> Result<(), JsValue> {
    if document.query_selector(STYLE_TAG_SELECTOR)?.is_some() {
        return Ok(());
    }

    let head = document
        .head()
        .ok_or_else(|| JsValue::from_str("Document không có thẻ <head>"))?;

    let style_el = document.create_element("style")?;
    style_el.set_attribute("data-ehr-demo-ui", "v1")?;
    style_el.set_text_content(Some(DEFAULT_STYLES));
    head.append_child(&style_el.clone().dyn_into::<Node>()?)?;

    Ok(())
}
