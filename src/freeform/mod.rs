// Freeform tool-calling modules
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod query;
pub mod snippet;
pub mod toolkit;

use crate::shared::config::InferenceConfig;
use crate::shared::{Conversation, InferenceClient};
use anyhow::{Context, Result};
use orchestrator::{Orchestrator, RunOutcome, StopReason};
use query::QueryTool;
use snippet::SnippetTool;
use std::path::PathBuf;
use std::sync::Arc;
use toolkit::Toolkit;
use tracing::{info, warn};

pub const DEFAULT_TASK: &str = "
1) Write SQL to compute mean of sepal_length, sepal_width, petal_length, petal_width grouped by species.
   Return a tidy CSV with species and the four means (rounded to 2 decimals).
2) Then write Python to read that CSV string (provided as tool output), pretty-print a table,
   and produce a bar chart of mean petal_length by species using Matplotlib.
";

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub csv_path: PathBuf,
    pub table: String,
    pub max_iterations: usize,
    pub figure_path: PathBuf,
    pub python: String,
    pub snippet_inputs: Option<serde_json::Value>,
    pub prompt: Option<String>,
}

/// Instructions that teach the model the fenced-block calling convention.
pub fn system_prompt(table: &str, columns: &[String]) -> String {
    format!(
        "You are a data analyst with access to tools. When you need to execute SQL queries or Python code, format them as code blocks:

For SQL queries, use:
```sql
YOUR_SQL_QUERY_HERE
```

For Python code, use:
```python
YOUR_PYTHON_CODE_HERE
```

You have access to a table named {} with columns: {} (all stored as text, cast as needed).
",
        table,
        columns.join(", ")
    )
}

pub async fn run(inference: InferenceConfig, settings: RunSettings) -> Result<RunOutcome> {
    info!("Starting freeform tool-calling demo...");
    info!("Using deployment: {}", inference.deployment);

    let client = InferenceClient::new(&inference).context("failed to initialize inference client")?;
    info!("Using inference endpoint: {}", client.url());

    let query = QueryTool::from_csv(&settings.csv_path, &settings.table)
        .await
        .with_context(|| format!("failed to load source table {}", settings.csv_path.display()))?;
    let system = system_prompt(query.table(), query.columns());

    let mut snippet = SnippetTool::new(settings.python, settings.figure_path);
    if let Some(inputs) = settings.snippet_inputs {
        snippet = snippet.with_inputs(inputs);
    }
    info!("Figures will be saved to {}", snippet.figure_path().display());

    let toolkit = Toolkit::new(Box::new(query), Box::new(snippet));
    let mut orchestrator =
        Orchestrator::new(Arc::new(client), toolkit).with_max_iterations(settings.max_iterations);
    info!("Allowing up to {} tool rounds", orchestrator.max_iterations());

    let mut conversation = Conversation::new(system);
    conversation.push_user(settings.prompt.unwrap_or_else(|| DEFAULT_TASK.to_string()));

    let outcome = orchestrator.run(conversation).await?;
    info!(
        "Run used {} completion call(s) and {} message(s)",
        outcome.completion_calls,
        outcome.conversation.len()
    );
    if outcome.stop_reason == StopReason::IterationLimit {
        warn!(
            "Stopped after {} iterations with actions still being requested",
            outcome.iterations
        );
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::extract::{extract_actions, ActionKind};

    #[test]
    fn test_system_prompt_lists_columns_and_fences() {
        let columns = vec!["sepal_length".to_string(), "species".to_string()];
        let prompt = system_prompt("iris", &columns);

        assert!(prompt.contains("a table named iris with columns: sepal_length, species"));
        let kinds: Vec<ActionKind> = extract_actions(&prompt).iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![ActionKind::Query, ActionKind::Snippet]);
    }
}
