use std::rc::Rc;

use ehr_demo_core::{
    detail_view, handle_callback, load_session, reset_key, submit_key, summarize_reports,
    AppConfig, CallbackOutcome, DemoError, DetailView, KeyForm, Route, SmartConfig, StepStatus,
    WizardEvent, WizardState, WizardStep, CALLBACK_ERROR, SUMMARY_PROMPT,
};
use ehr_demo_fhir::{authorize, CallbackParams, SessionClient, SmartLauncher};
use ehr_demo_openai::OpenAiClient;
use serde_wasm_bindgen::from_value;
use wasm_bindgen::prelude::*;
use web_sys::{console, Document, Element, HtmlInputElement, Window};
use yew::platform::spawn_local;
use yew::prelude::*;

use crate::browser::{self, key_store, BrowserStorage};
use crate::config::JsAppConfig;
use crate::styles;

type Session = SessionClient<SmartLauncher<BrowserStorage>>;

/// Phiên SMART lưu trong sessionStorage, giống cách thư viện fhirclient làm.
fn build_session(callback: Option<CallbackParams>) -> Result<Session, DemoError> {
    let storage = BrowserStorage::session()?;
    let launcher = SmartLauncher::new(reqwest::Client::new(), storage).with_callback(callback);
    Ok(SessionClient::new(launcher))
}

/// Chuyển trình duyệt sang trang đăng nhập của Epic.
async fn start_sign_in(smart: &SmartConfig) -> Result<(), DemoError> {
    let storage = BrowserStorage::session()?;
    let request = authorize(&reqwest::Client::new(), smart, &storage).await?;
    browser::navigate(request.url.as_str())
}

fn log_error(err: &DemoError) {
    console::error_1(&JsValue::from_str(&err.to_string()));
}

#[derive(Clone, Default, PartialEq)]
struct WizardModel {
    state: WizardState,
}

impl Reducible for WizardModel {
    type Action = WizardEvent;

    fn reduce(self: Rc<Self>, action: Self::Action) -> Rc<Self> {
        let mut state = self.state.clone();
        state.apply(action);
        Rc::new(Self { state })
    }
}

#[derive(Properties, PartialEq)]
pub struct AppProps {
    pub config: AppConfig,
}

#[function_component(App)]
fn app(props: &AppProps) -> Html {
    use_effect_with((), |_| {
        if let Some(document) = web_sys::window().and_then(|window| window.document()) {
            if let Err(err) = styles::ensure_styles(&document) {
                console::error_1(&err);
            }
        }
        || ()
    });

    let page = match Route::from_path(&browser::current_path()) {
        Route::Callback => html! { <CallbackPage /> },
        Route::Wizard => html! { <WizardPage config={props.config.clone()} /> },
    };

    html! { <main class="ehr-demo">{ page }</main> }
}

#[derive(Properties, PartialEq)]
struct WizardPageProps {
    config: AppConfig,
}

#[function_component(WizardPage)]
fn wizard_page(props: &WizardPageProps) -> Html {
    let session = use_memo((), |_| build_session(None));
    let wizard = use_reducer(WizardModel::default);
    let signing_in = use_state(|| false);
    let key_input = use_node_ref();
    let save_input = use_node_ref();

    {
        let session = session.clone();
        let dispatcher = wizard.dispatcher();
        use_effect_with((), move |_| {
            spawn_local(async move {
                let loaded = match (&*session, key_store()) {
                    (Ok(session), Ok(keys)) => load_session(session, &keys).await,
                    (Err(err), _) => Err(err.clone()),
                    (_, Err(err)) => Err(err),
                };
                match loaded {
                    Ok(event) => dispatcher.dispatch(event),
                    Err(err) => {
                        log_error(&err);
                        dispatcher.dispatch(WizardEvent::LoadFailed);
                    }
                }
            });
            || ()
        });
    }

    {
        let pending = wizard.state.pending_query().map(str::to_owned);
        let session = session.clone();
        let dispatcher = wizard.dispatcher();
        let chat = props.config.chat.clone();
        use_effect_with(pending, move |pending| {
            if let Some(key) = pending.clone() {
                dispatcher.dispatch(WizardEvent::QueryStarted(key.clone()));
                spawn_local(async move {
                    let outcome = match &*session {
                        Ok(session) => {
                            let client = OpenAiClient::new(&chat);
                            summarize_reports(session, &client, &chat.model, &key).await
                        }
                        Err(err) => Err(err.clone()),
                    };
                    if let Err(err) = &outcome {
                        log_error(err);
                    }
                    dispatcher.dispatch(WizardEvent::QueryFinished { key, outcome });
                });
            }
            || ()
        });
    }

    let on_sign_in = {
        let signing_in = signing_in.clone();
        let dispatcher = wizard.dispatcher();
        let smart = props.config.smart.clone();
        Callback::from(move |_: MouseEvent| {
            signing_in.set(true);
            let signing_in = signing_in.clone();
            let dispatcher = dispatcher.clone();
            let smart = smart.clone();
            spawn_local(async move {
                if let Err(err) = start_sign_in(&smart).await {
                    log_error(&err);
                    signing_in.set(false);
                    dispatcher.dispatch(WizardEvent::ErrorRaised(err.to_string()));
                }
            });
        })
    };

    let on_submit = {
        let dispatcher = wizard.dispatcher();
        let key_input = key_input.clone();
        let save_input = save_input.clone();
        Callback::from(move |event: SubmitEvent| {
            event.prevent_default();
            let form = KeyForm {
                key: key_input
                    .cast::<HtmlInputElement>()
                    .map(|input| input.value())
                    .unwrap_or_default(),
                save: save_input
                    .cast::<HtmlInputElement>()
                    .map(|input| input.checked())
                    .unwrap_or(false),
            };
            match key_store().and_then(|keys| submit_key(&keys, &form)) {
                Ok(event) => dispatcher.dispatch(event),
                Err(err) => dispatcher.dispatch(WizardEvent::ErrorRaised(err.to_string())),
            }
        })
    };

    let on_reset = {
        let dispatcher = wizard.dispatcher();
        Callback::from(move |_: MouseEvent| {
            match key_store().and_then(|keys| reset_key(&keys)) {
                Ok(event) => dispatcher.dispatch(event),
                Err(err) => dispatcher.dispatch(WizardEvent::ErrorRaised(err.to_string())),
            }
        })
    };

    let on_dismiss = {
        let dispatcher = wizard.dispatcher();
        Callback::from(move |_: MouseEvent| dispatcher.dispatch(WizardEvent::ErrorDismissed))
    };

    let state = &wizard.state;

    let sign_in_card = html! {
        <section class="step-card">
            <h5>{"Sign in to your Epic account:"}</h5>
            <button type="button" class="button" onclick={on_sign_in} disabled={*signing_in}>
                { if *signing_in { "Signing in..." } else { "Sign In" } }
            </button>
        </section>
    };

    let key_card = html! {
        <section class="step-card">
            <form class="key-form" onsubmit={on_submit}>
                <p>{ format!("Welcome {}", state.patient_name().unwrap_or_default()) }</p>
                <label for="key">{"OpenAI (ChatGPT) key"}</label>
                <input id="key" type="password" required=true ref={key_input} autocomplete="off" />
                <div class="checkbox-row">
                    <label for="save">{"Save to local storage"}</label>
                    <input id="save" type="checkbox" ref={save_input} />
                </div>
                <button type="submit" class="button">{"Submit"}</button>
            </form>
        </section>
    };

    let query_card = html! {
        <section class="step-card">
            <div class="step-centered">
                <h5>{"Querying..."}</h5>
                <p class="step-prompt">{ format!("Asking ChatGPT: \"{SUMMARY_PROMPT}{{DiagnosticReports}}\"") }</p>
                <div class="spinner" />
            </div>
            <button type="button" class="button" onclick={on_reset.clone()}>{"Reset Key"}</button>
        </section>
    };

    let results_card = html! {
        <section class="step-card">
            <div class="step-centered">
                <h5>{"ChatGPT Response:"}</h5>
                <p class="step-result">{ state.summary.clone().unwrap_or_default() }</p>
            </div>
            <button type="button" class="button button-secondary" onclick={on_reset}>{"Reset Key"}</button>
        </section>
    };

    html! {
        <div class="wizard-root">
            <header class="wizard-header">
                <h1>{"Epic EHR Demo"}</h1>
            </header>
            { render_error(state.error.as_deref(), on_dismiss) }
            <div class="wizard-grid">
                <ol class="step-list">
                    { for WizardStep::ALL.into_iter().map(|step| render_step_item(step, state)) }
                </ol>
                <div class="step-details">
                    { render_detail(state.detail_of(WizardStep::SignIn), sign_in_card) }
                    { render_detail(state.detail_of(WizardStep::ProvideKey), key_card) }
                    // Bước 3 và 4 tự hiển thị trạng thái đang chạy, giữ nút Reset Key.
                    { render_detail(detail_without_loading(state, WizardStep::Query), query_card) }
                    { render_detail(detail_without_loading(state, WizardStep::Results), results_card) }
                </div>
            </div>
        </div>
    }
}

fn detail_without_loading(state: &WizardState, step: WizardStep) -> DetailView {
    detail_view(step, state.current_step, false)
}

fn render_step_item(step: WizardStep, state: &WizardState) -> Html {
    let (modifier, marker) = match state.status_of(step) {
        StepStatus::Completed => ("is-completed", Some("✓")),
        StepStatus::Active => ("is-active", Some("→")),
        StepStatus::Upcoming => ("is-upcoming", None),
    };

    html! {
        <li class={classes!("step-item", modifier)} role="alert">
            <h3>{ step.label() }</h3>
            { marker.map(|marker| html! { <span class="step-marker" aria-hidden="true">{ marker }</span> }).unwrap_or_default() }
        </li>
    }
}

fn render_detail(view: DetailView, content: Html) -> Html {
    match view {
        DetailView::Hidden => Html::default(),
        DetailView::Spinner => html! {
            <section class="step-card step-loading">
                <div class="spinner spinner-xl" />
            </section>
        },
        DetailView::Content => content,
    }
}

fn render_error(error: Option<&str>, on_dismiss: Callback<MouseEvent>) -> Html {
    let Some(message) = error else {
        return Html::default();
    };

    html! {
        <div class="alert" role="alert">
            <span class="alert-title">{"Error!"}</span>
            <span class="alert-message">{ message.to_string() }</span>
            <button type="button" class="alert-dismiss" aria-label="Dismiss" onclick={on_dismiss}>{"×"}</button>
        </div>
    }
}

fn callback_session() -> Result<Session, DemoError> {
    let href = browser::current_href()?;
    let params = CallbackParams::from_href(&href)?;
    build_session(params)
}

/// Trang nhận redirect từ Epic; chỉ chạy kiểm tra phiên một lần khi mount.
#[function_component(CallbackPage)]
fn callback_page() -> Html {
    let error = use_state(|| None::<String>);

    {
        let error = error.clone();
        use_effect_with((), move |_| {
            spawn_local(async move {
                let outcome = match callback_session() {
                    Ok(session) => handle_callback(&session).await,
                    Err(err) => {
                        log_error(&err);
                        CallbackOutcome::Failed(CALLBACK_ERROR.to_string())
                    }
                };
                match outcome {
                    CallbackOutcome::Redirect(route) => {
                        if let Err(err) = browser::navigate(route.path()) {
                            log_error(&err);
                            error.set(Some(CALLBACK_ERROR.to_string()));
                        }
                    }
                    CallbackOutcome::Failed(message) => error.set(Some(message)),
                }
            });
            || ()
        });
    }

    html! {
        <div class="callback-root">
            {
                match (*error).clone() {
                    Some(message) => html! {
                        <div class="alert" role="alert">
                            <span class="alert-title">{"Error:"}</span>
                            <span class="alert-message">{ message }</span>
                        </div>
                    },
                    None => html! { <div class="spinner spinner-xl" /> },
                }
            }
        </div>
    }
}

#[wasm_bindgen]
pub fn mount_app(selector: &str, config: JsValue) -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    let window: Window = web_sys::window().ok_or_else(|| JsValue::from_str("Không có window"))?;
    let document: Document = window
        .document()
        .ok_or_else(|| JsValue::from_str("Không truy cập được document"))?;

    let target: Element = document
        .query_selector(selector)
        .map_err(|err| JsValue::from_str(&format!("Selector lỗi: {err:?}")))?
        .ok_or_else(|| JsValue::from_str("Không tìm thấy element theo selector"))?;

    let config = if config.is_undefined() || config.is_null() {
        AppConfig::default()
    } else {
        let cfg: JsAppConfig = from_value(config)
            .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}")))?;
        AppConfig::from(cfg)
    };

    yew::Renderer::<App>::with_root_and_props(target, AppProps { config }).render();
    Ok(())
}
