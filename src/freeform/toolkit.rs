use super::error::Result;
use super::extract::{Action, ActionKind};
use async_trait::async_trait;
use tracing::{info, warn};

/// Executor capability for one action kind: code text in, result text out.
#[async_trait]
pub trait Tool: Send {
    fn name(&self) -> &str;
    async fn execute(&mut self, body: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub kind: ActionKind,
    pub tool: String,
    pub output: String,
    pub failed: bool,
}

/// Routes each action to the tool registered for its kind.
pub struct Toolkit {
    query: Box<dyn Tool>,
    snippet: Box<dyn Tool>,
}

impl Toolkit {
    pub fn new(query: Box<dyn Tool>, snippet: Box<dyn Tool>) -> Self {
        Self { query, snippet }
    }

    /// Execute one action. Failures come back as error text, never as `Err`.
    pub async fn run(&mut self, action: &Action) -> ActionResult {
        let tool = match action.kind {
            ActionKind::Query => self.query.as_mut(),
            ActionKind::Snippet => self.snippet.as_mut(),
        };
        let name = tool.name().to_string();

        match tool.execute(action.body.trim()).await {
            Ok(output) => {
                info!("{} output:\n{}", name, output);
                ActionResult {
                    kind: action.kind,
                    tool: name,
                    output,
                    failed: false,
                }
            }
            Err(err) => {
                warn!("{} failed: {}", name, err);
                ActionResult {
                    kind: action.kind,
                    tool: name,
                    output: format!("Error: {}", err),
                    failed: true,
                }
            }
        }
    }

    /// Execute actions one after another in the given order.
    pub async fn run_all(&mut self, actions: &[Action]) -> Vec<ActionResult> {
        let mut results = Vec::with_capacity(actions.len());
        for action in actions {
            results.push(self.run(action).await);
        }
        results
    }
}

/// Render results as the user turn that hands them back to the model.
pub fn format_tool_results(results: &[ActionResult]) -> String {
    let mut text = String::from("Tool results:");
    for result in results {
        text.push_str(&format!("\n--- {} output ---\n{}\n", result.tool, result.output));
    }
    text.push_str("\nPlease continue with the analysis.");
    text
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::freeform::error::FreeformError;
    use std::sync::{Arc, Mutex};

    /// Records every body it receives and answers from a fixed script.
    pub(crate) struct RecordingTool {
        pub name: &'static str,
        pub calls: Arc<Mutex<Vec<String>>>,
        pub fail_on: Option<&'static str>,
    }

    impl RecordingTool {
        pub fn new(name: &'static str) -> (Self, Arc<Mutex<Vec<String>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    name,
                    calls: calls.clone(),
                    fail_on: None,
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl Tool for RecordingTool {
        fn name(&self) -> &str {
            self.name
        }

        async fn execute(&mut self, body: &str) -> Result<String> {
            self.calls.lock().unwrap().push(body.to_string());
            if self.fail_on.map(|needle| body.contains(needle)).unwrap_or(false) {
                return Err(FreeformError::Snippet(format!("cannot run '{}'", body)));
            }
            Ok(format!("ran {}", body))
        }
    }

    fn action(kind: ActionKind, body: &str) -> Action {
        Action {
            kind,
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn test_dispatches_by_kind_in_order() {
        let (query, query_calls) = RecordingTool::new("sql_exec_sqlite");
        let (snippet, snippet_calls) = RecordingTool::new("code_exec_python");
        let mut toolkit = Toolkit::new(Box::new(query), Box::new(snippet));

        let results = toolkit
            .run_all(&[
                action(ActionKind::Query, "  SELECT 1;\n"),
                action(ActionKind::Snippet, "print(1)"),
                action(ActionKind::Query, "SELECT 2;"),
            ])
            .await;

        assert_eq!(*query_calls.lock().unwrap(), vec!["SELECT 1;", "SELECT 2;"]);
        assert_eq!(*snippet_calls.lock().unwrap(), vec!["print(1)"]);
        let tools: Vec<&str> = results.iter().map(|r| r.tool.as_str()).collect();
        assert_eq!(tools, vec!["sql_exec_sqlite", "code_exec_python", "sql_exec_sqlite"]);
        assert!(results.iter().all(|r| !r.failed));
    }

    #[tokio::test]
    async fn test_failures_become_error_text() {
        let (query, _) = RecordingTool::new("sql_exec_sqlite");
        let (mut snippet, _) = RecordingTool::new("code_exec_python");
        snippet.fail_on = Some("boom");
        let mut toolkit = Toolkit::new(Box::new(query), Box::new(snippet));

        let result = toolkit.run(&action(ActionKind::Snippet, "boom()")).await;
        assert!(result.failed);
        assert_eq!(result.output, "Error: cannot run 'boom()'");
    }

    #[test]
    fn test_format_tool_results() {
        let results = vec![
            ActionResult {
                kind: ActionKind::Query,
                tool: "sql_exec_sqlite".to_string(),
                output: "n\n3\n".to_string(),
                failed: false,
            },
            ActionResult {
                kind: ActionKind::Snippet,
                tool: "code_exec_python".to_string(),
                output: "Error: NameError: name 'x' is not defined".to_string(),
                failed: true,
            },
        ];

        assert_eq!(
            format_tool_results(&results),
            "Tool results:\n--- sql_exec_sqlite output ---\nn\n3\n\n\
             \n--- code_exec_python output ---\nError: NameError: name 'x' is not defined\n\
             \nPlease continue with the analysis."
        );
    }
}
