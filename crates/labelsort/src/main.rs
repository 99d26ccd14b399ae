use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};

use labelsort::gmail::GmailAuthenticator;
use labelsort::{
    load_config, logging, CancellationFlag, Config, Engine, EngineConfig, GmailClient,
    LabelsortError, OllamaClient, RunSummary,
};

const DEFAULT_CONFIG_PATH: &str = "config.json";
const CONFIG_ENV_VAR: &str = "LABELSORT_CONFIG";

fn usage() -> String {
    format!(
        "Usage: labelsort [CONFIG]\n\n\
         Files inbox messages into AI_AUTO_* labels by comparing them with\n\
         messages already filed there.\n\n\
         CONFIG defaults to ${} or {}. Without a usable token the first run\n\
         prints a Google consent address and waits for the authorization.",
        CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH
    )
}

fn main() -> ExitCode {
    let arg = std::env::args().nth(1);
    match arg.as_deref() {
        Some("-h") | Some("--help") => {
            println!("{}", usage());
            return ExitCode::SUCCESS;
        }
        Some("-V") | Some("--version") => {
            println!("labelsort {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        _ => {}
    }

    let config_path = arg
        .or_else(|| std::env::var(CONFIG_ENV_VAR).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("labelsort: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.log_level, config.log_format) {
        eprintln!("labelsort: {}", e);
        return ExitCode::FAILURE;
    }
    info!(
        "Starting labelsort v{} with config {}",
        env!("CARGO_PKG_VERSION"),
        config_path
    );

    let cancel = CancellationFlag::new();
    let handler_flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if handler_flag.is_cancelled() {
            std::process::exit(130);
        }
        handler_flag.cancel();
        eprintln!("Stopping after the current message (press Ctrl-C again to abort)");
    }) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config, cancel)) {
        Ok(summary) => {
            println!("{}", summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("labelsort: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config, cancel: CancellationFlag) -> Result<RunSummary, LabelsortError> {
    let engine_config = EngineConfig::from_config(&config)?;

    let authenticator = GmailAuthenticator::new(config.auth.clone(), config.gmail_scopes.clone());
    let token = authenticator.access_token().await?;
    let mail = GmailClient::new(token)?;

    let llm = OllamaClient::new(
        config.ollama_host.clone(),
        config.ollama_temperature,
        Duration::from_secs(config.ollama_timeout_secs),
    )?;
    info!(
        "Using model {} at {}",
        config.ollama_model,
        llm.host()
    );

    let engine =
        Engine::new(Arc::new(mail), Arc::new(llm), engine_config).with_cancellation(cancel);
    Ok(engine.run().await?)
}
