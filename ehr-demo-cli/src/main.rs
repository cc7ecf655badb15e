mod storage;

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use ehr_demo_core::{
    handle_callback, reset_key, ApiKeyStore, AppConfig, CallbackOutcome, Environment, KeyForm,
    StepStatus, WizardController, WizardState, WizardStep,
};
use ehr_demo_fhir::{authorize, CallbackParams, SessionClient, SmartLauncher};
use ehr_demo_openai::OpenAiClient;
use tracing_subscriber::EnvFilter;

use crate::storage::FileStorage;

#[derive(Parser, Debug)]
#[command(
    name = "ehr-demo",
    about = "Đăng nhập Epic, lấy DiagnosticReport và nhờ ChatGPT tóm tắt."
)]
struct Args {
    /// Môi trường đăng ký ứng dụng Epic (local | deployed).
    #[arg(long, env = "EHR_DEMO_ENV", default_value = "local")]
    environment: Environment,

    /// File lưu OpenAI key và phiên SMART.
    #[arg(long, env = "EHR_DEMO_STATE")]
    state_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// In URL đăng nhập Epic và ghi nhớ yêu cầu đang chờ.
    Authorize,
    /// Hoàn tất đăng nhập từ URL mà Epic redirect về.
    Callback {
        /// URL đầy đủ của trang callback (có `code` và `state`).
        redirect_url: String,
    },
    /// Chạy wizard: tải bệnh nhân, nhận key, truy vấn ChatGPT.
    Summarize {
        /// OpenAI key; bỏ qua nếu đã lưu trước đó.
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        key: Option<String>,
        /// Lưu key cho các lần chạy sau.
        #[arg(long)]
        save: bool,
        /// Model chat completion.
        #[arg(long)]
        model: Option<String>,
    },
    /// Xóa OpenAI key đã lưu.
    ResetKey,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let path = match args.state_file {
        Some(path) => path,
        None => FileStorage::default_path()?,
    };
    tracing::debug!(path = %path.display(), environment = %args.environment, "mở file trạng thái");
    let storage = Rc::new(FileStorage::open(&path)?);
    let config = AppConfig::for_environment(args.environment);
    let http = reqwest::Client::new();

    match args.command {
        Command::Authorize => {
            let request = authorize(&http, &config.smart, &storage)
                .await
                .context("Không tạo được yêu cầu đăng nhập")?;
            println!("{}", request.url);
        }
        Command::Callback { redirect_url } => {
            let params = CallbackParams::from_href(&redirect_url)?;
            let launcher = SmartLauncher::new(http, storage).with_callback(params);
            match handle_callback(&SessionClient::new(launcher)).await {
                CallbackOutcome::Redirect(route) => {
                    tracing::info!(?route, "phiên Epic đã sẵn sàng");
                    println!("Đã đăng nhập Epic.");
                }
                CallbackOutcome::Failed(message) => bail!(message),
            }
        }
        Command::Summarize { key, save, model } => {
            let model = model.unwrap_or_else(|| config.chat.model.clone());
            let session = SessionClient::new(SmartLauncher::new(http.clone(), storage.clone()));
            let summarizer = OpenAiClient::with_http(http, &config.chat);
            let mut wizard = WizardController::new(session, summarizer, storage, model);

            wizard.initial_load().await;
            match wizard.state().current_step {
                WizardStep::SignIn => {
                    print_steps(wizard.state());
                    bail!("Chưa có phiên Epic, hãy chạy `ehr-demo authorize` trước");
                }
                WizardStep::ProvideKey => {
                    let key = key.context("Cần OpenAI key (--key hoặc OPENAI_API_KEY)")?;
                    wizard.submit_key(KeyForm { key, save }).await;
                }
                WizardStep::Query | WizardStep::Results => {}
            }

            let state = wizard.state();
            print_steps(state);
            if let Some(error) = &state.error {
                bail!("Error! {error}");
            }
            if let Some(summary) = &state.summary {
                println!("\nChatGPT Response:\n{summary}");
            }
        }
        Command::ResetKey => {
            reset_key(&ApiKeyStore::new(storage))?;
            println!("Đã xóa OpenAI key.");
        }
    }

    Ok(())
}

fn print_steps(state: &WizardState) {
    if let Some(name) = state.patient_name() {
        println!("Welcome {name}");
    }
    for step in WizardStep::ALL {
        let marker = match state.status_of(step) {
            StepStatus::Completed => "[x]",
            StepStatus::Active => "[>]",
            StepStatus::Upcoming => "[ ]",
        };
        println!("{marker} {}", step.label());
    }
}
