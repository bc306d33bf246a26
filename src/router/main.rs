use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

#[path = "../router/mod.rs"]
mod router;
#[path = "../shared/mod.rs"]
mod shared;

#[derive(Parser)]
#[command(name = "router-chat")]
#[command(about = "Interactive multi-turn chat against a model-router deployment")]
struct Args {
    #[command(flatten)]
    inference: shared::config::InferenceArgs,

    /// System prompt that opens every conversation
    #[arg(long, env = "SYSTEM_PROMPT", default_value = "You are a helpful assistant.")]
    system_prompt: String,

    /// Number of recent user/assistant pairs sent with each request
    #[arg(long, env = "MAX_HISTORY_TURNS", default_value_t = 12)]
    max_history_turns: usize,

    #[arg(long, env = "MAX_OUTPUT_TOKENS", default_value_t = 10000)]
    max_output_tokens: u32,

    #[arg(long, env = "TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    #[arg(long, env = "TOP_P", default_value_t = 0.95)]
    top_p: f32,

    #[arg(long, env = "FREQ_PENALTY", default_value_t = 0.0)]
    frequency_penalty: f32,

    #[arg(long, env = "PRES_PENALTY", default_value_t = 0.0)]
    presence_penalty: f32,

    /// Write logs to this directory instead of only the console
    #[arg(long, env = "ROUTER_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let _log_guard = shared::logging::init_service_logging(args.log_dir.as_deref(), "router_chat")
        .ok()
        .flatten();

    let inference = args
        .inference
        .into_config()
        .context("invalid inference configuration")?;

    let settings = router::ChatSettings {
        system_prompt: args.system_prompt,
        max_history_turns: args.max_history_turns,
        options: shared::inference::CompletionOptions {
            max_tokens: Some(args.max_output_tokens),
            temperature: Some(args.temperature),
            top_p: Some(args.top_p),
            frequency_penalty: Some(args.frequency_penalty),
            presence_penalty: Some(args.presence_penalty),
        },
    };

    router::run(inference, settings).await
}
