use super::error::Result;
use super::extract::{extract_actions, Action};
use super::toolkit::{format_tool_results, Toolkit};
use crate::shared::{CompletionService, Conversation};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_ITERATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model replied without requesting any action.
    NoActions,
    /// The iteration ceiling was reached with actions still being requested.
    IterationLimit,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub final_text: String,
    pub stop_reason: StopReason,
    pub iterations: usize,
    pub completion_calls: usize,
    pub conversation: Conversation,
}

enum LoopState {
    AwaitingModel,
    HasResponse(String),
    Executing { response: String, actions: Vec<Action> },
    Terminal { reason: StopReason, text: String },
}

/// Drives the ask-model / run-actions loop over one conversation.
pub struct Orchestrator {
    completion: Arc<dyn CompletionService>,
    toolkit: Toolkit,
    max_iterations: usize,
}

impl Orchestrator {
    pub fn new(completion: Arc<dyn CompletionService>, toolkit: Toolkit) -> Self {
        Self {
            completion,
            toolkit,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Ceiling on action rounds per run; values below one are raised to one.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Run until the model stops requesting actions or the ceiling is hit.
    ///
    /// Action failures are fed back to the model as text. Completion
    /// service errors end the run and are returned as-is.
    pub async fn run(&mut self, mut conversation: Conversation) -> Result<RunOutcome> {
        let mut iterations = 0;
        let mut completion_calls = 0;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    info!("--- Iteration {} ---", iterations + 1);
                    completion_calls += 1;
                    let response = self.completion.complete(conversation.messages()).await?;
                    info!("Model response:\n{}", response.content);
                    debug!(
                        "Token usage: prompt={:?} completion={:?} total={:?}",
                        response.prompt_tokens, response.completion_tokens, response.total_tokens
                    );
                    LoopState::HasResponse(response.content)
                }
                LoopState::HasResponse(response) => {
                    let actions = extract_actions(&response);
                    if actions.is_empty() {
                        LoopState::Terminal {
                            reason: StopReason::NoActions,
                            text: response,
                        }
                    } else {
                        conversation.push_assistant(response.clone());
                        LoopState::Executing { response, actions }
                    }
                }
                LoopState::Executing { response, actions } => {
                    info!("Running {} requested action(s)", actions.len());
                    let results = self.toolkit.run_all(&actions).await;
                    for result in &results {
                        debug!(
                            "Action {} via {} finished (failed={})",
                            result.kind, result.tool, result.failed
                        );
                    }
                    let failures = results.iter().filter(|r| r.failed).count();
                    if failures > 0 {
                        warn!("{} of {} action(s) failed this round", failures, results.len());
                    }
                    conversation.push_user(format_tool_results(&results));
                    iterations += 1;

                    if iterations >= self.max_iterations {
                        LoopState::Terminal {
                            reason: StopReason::IterationLimit,
                            text: response,
                        }
                    } else {
                        LoopState::AwaitingModel
                    }
                }
                LoopState::Terminal { reason, text } => {
                    info!(
                        "Conversation finished after {} completion call(s): {:?}",
                        completion_calls, reason
                    );
                    return Ok(RunOutcome {
                        final_text: text,
                        stop_reason: reason,
                        iterations,
                        completion_calls,
                        conversation,
                    });
                }
            };
        }
    }
}
