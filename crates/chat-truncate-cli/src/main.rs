use anyhow::{Context, Result};
use chat_truncate::{ChatMlRenderer, HeuristicTokenCounter, ServerParams};
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;

mod logging;
mod request;

use logging::init_logging;
use request::ChatRequest;

#[derive(Parser, Debug, Clone)]
#[command(name = "chat-truncate")]
#[command(about = "Fit a chat request into its slot's context budget")]
#[command(version)]
struct Cli {
    /// Total context size shared by all slots
    #[arg(long, env = "CTX_SIZE")]
    ctx_size: Option<u32>,

    /// Number of parallel request slots
    #[arg(long, env = "PARALLEL")]
    parallel: Option<u32>,

    /// Default generation length (-1 = unbounded)
    #[arg(long, env = "N_PREDICT", allow_hyphen_values = true)]
    n_predict: Option<i32>,

    /// Drop the oldest turns until the prompt is under FRACTION of the slot context
    #[arg(long, env = "CHAT_TRUNCATE", value_name = "FRACTION")]
    chat_truncate: Option<f64>,

    /// JSON file with server params; explicit flags take precedence
    #[arg(long, env = "CHAT_TRUNCATE_CONFIG")]
    config: Option<PathBuf>,

    /// Chat request JSON (reads stdin when omitted)
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// Include the rendered prompt in the response
    #[arg(long)]
    verbose: bool,

    /// Enable debug mode
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Log level (overrides debug flag)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn server_params(&self) -> Result<ServerParams> {
        let mut params = match &self.config {
            Some(path) => ServerParams::from_file(path)?,
            None => ServerParams::default(),
        };
        if let Some(n_ctx) = self.ctx_size {
            params.n_ctx = n_ctx;
        }
        if let Some(n_parallel) = self.parallel {
            params.n_parallel = n_parallel;
        }
        if let Some(n_predict) = self.n_predict {
            params.n_predict = n_predict;
        }
        if self.chat_truncate.is_some() {
            params.chat_truncate = self.chat_truncate;
        }
        Ok(params)
    }
}

fn read_request(input: Option<&PathBuf>) -> Result<ChatRequest> {
    let content = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request from {:?}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request from stdin")?;
            buf
        }
    };
    serde_json::from_str(&content).context("Invalid chat request JSON")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.log_level.as_deref());

    let params = cli.server_params()?;
    params.validate().context("Invalid server configuration")?;
    let config = params.truncation_config()?;

    tracing::info!(
        "Context: {} tokens over {} slots ({} per slot), n_predict {}",
        params.n_ctx,
        params.n_parallel,
        params.n_ctx_slot(),
        params.n_predict
    );
    if config.is_enabled() {
        tracing::info!("Chat truncation enabled, target fraction {}", config.fraction());
    }

    let request = read_request(cli.input.as_ref())?;
    let renderer = ChatMlRenderer::new(HeuristicTokenCounter::default());
    let response = request::handle(request, &params, &config, &renderer, cli.verbose);

    println!("{}", serde_json::to_string_pretty(&response.body)?);
    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
