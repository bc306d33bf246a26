use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

#[path = "../freeform/mod.rs"]
mod freeform;
#[path = "../shared/mod.rs"]
mod shared;

#[derive(Parser)]
#[command(name = "freeform-demo")]
#[command(about = "Freeform tool calling - the model replies with ```sql / ```python blocks that run locally")]
struct Args {
    #[command(flatten)]
    inference: shared::config::InferenceArgs,

    /// CSV file loaded into the in-memory query table
    #[arg(long, env = "FREEFORM_CSV", default_value = "iris.csv")]
    csv: PathBuf,

    /// Table name the CSV is loaded as
    #[arg(long, env = "FREEFORM_TABLE", default_value = "iris")]
    table: String,

    /// Maximum number of tool-calling rounds
    #[arg(
        long,
        env = "FREEFORM_MAX_ITERATIONS",
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    max_iterations: u64,

    /// Where charts produced by Python snippets are written
    #[arg(long, env = "FREEFORM_FIGURE_PATH", default_value = "iris_plot.png")]
    figure_path: PathBuf,

    /// Python interpreter used for snippets
    #[arg(long, env = "FREEFORM_PYTHON", default_value = "python3")]
    python: String,

    /// JSON value bound to `inputs` inside snippets
    #[arg(long, env = "FREEFORM_SNIPPET_INPUTS")]
    snippet_inputs: Option<String>,

    /// Task for the model (defaults to the iris analysis)
    #[arg(long)]
    prompt: Option<String>,

    /// Also write logs to this directory
    #[arg(long, env = "FREEFORM_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let _log_guard = shared::logging::init_service_logging(args.log_dir.as_deref(), "freeform_demo")
        .ok()
        .flatten();

    let inference = args
        .inference
        .into_config()
        .context("invalid inference configuration")?;

    let snippet_inputs = args
        .snippet_inputs
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("--snippet-inputs must be valid JSON")?;

    let settings = freeform::RunSettings {
        csv_path: args.csv,
        table: args.table,
        max_iterations: args.max_iterations as usize,
        figure_path: args.figure_path,
        python: args.python,
        snippet_inputs,
        prompt: args.prompt,
    };

    let outcome = freeform::run(inference, settings).await?;

    println!("\n--- Final Response ---");
    println!("{}", outcome.final_text);
    Ok(())
}
