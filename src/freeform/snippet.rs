use super::error::{FreeformError, Result};
use super::toolkit::Tool;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

// Runs the snippet with `inputs` as its only binding and saves any open
// matplotlib figure to the staging path given on the command line.
const HARNESS: &str = r#"import json
import sys

with open(sys.argv[1], "r", encoding="utf-8") as fh:
    inputs = json.load(fh)
figure_path = sys.argv[2]
with open(sys.argv[3], "r", encoding="utf-8") as fh:
    code = fh.read()

try:
    import matplotlib
    matplotlib.use("Agg")
    import matplotlib.pyplot as plt
except ImportError:
    plt = None

scope = {"inputs": inputs}
try:
    exec(compile(code, "<snippet>", "exec"), scope, scope)
except SystemExit:
    raise
except BaseException as exc:
    sys.stdout.flush()
    sys.stderr.write(f"{type(exc).__name__}: {exc}\n")
    sys.exit(1)

if plt is not None and plt.get_fignums():
    plt.savefig(figure_path, bbox_inches="tight", dpi=150)
    plt.close("all")
"#;

/// Python snippet runner. Snippets run with the host's privileges; swap the
/// `Tool` implementation to isolate them.
pub struct SnippetTool {
    interpreter: String,
    figure_path: PathBuf,
    inputs: Value,
}

impl SnippetTool {
    pub fn new(interpreter: impl Into<String>, figure_path: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            figure_path: figure_path.into(),
            inputs: Value::Object(Default::default()),
        }
    }

    pub fn with_inputs(mut self, inputs: Value) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn figure_path(&self) -> &Path {
        &self.figure_path
    }

    /// Run `code` and return its trimmed stdout, annotated when a figure was saved.
    pub async fn exec_code(&self, code: &str, inputs: Option<&Value>) -> Result<String> {
        let workdir = tempfile::tempdir()?;
        let harness = workdir.path().join("harness.py");
        let snippet = workdir.path().join("snippet.py");
        let inputs_path = workdir.path().join("inputs.json");
        let staged = workdir.path().join("figure.png");

        tokio::fs::write(&harness, HARNESS).await?;
        tokio::fs::write(&snippet, code).await?;
        tokio::fs::write(&inputs_path, serde_json::to_vec(inputs.unwrap_or(&self.inputs))?).await?;

        debug!("Running snippet with {}", self.interpreter);
        let output = Command::new(&self.interpreter)
            .arg(&harness)
            .arg(&inputs_path)
            .arg(&staged)
            .arg(&snippet)
            .env("MPLBACKEND", "Agg")
            .output()
            .await
            .map_err(|e| {
                FreeformError::Snippet(format!("Failed to run {}: {}", self.interpreter, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FreeformError::Snippet(failure_message(
                &stderr,
                output.status.code(),
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        finalize_output(&stdout, &staged, &self.figure_path).await
    }
}

#[async_trait]
impl Tool for SnippetTool {
    fn name(&self) -> &str {
        "code_exec_python"
    }

    async fn execute(&mut self, body: &str) -> Result<String> {
        self.exec_code(body, None).await
    }
}

/// Publish a staged figure to `figure_path` and note it in the output.
async fn finalize_output(stdout: &str, staged: &Path, figure_path: &Path) -> Result<String> {
    let mut output = stdout.trim().to_string();
    if tokio::fs::try_exists(staged).await? {
        tokio::fs::copy(staged, figure_path).await?;
        info!("Saved figure to {}", figure_path.display());
        if !output.is_empty() {
            output.push_str("\n\n");
        }
        output.push_str(&format!("[Saved figure to {}]", figure_path.display()));
    }
    Ok(output)
}

fn failure_message(stderr: &str, code: Option<i32>) -> String {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| match code {
            Some(code) => format!("snippet exited with status {}", code),
            None => "snippet terminated by signal".to_string(),
        })
}
