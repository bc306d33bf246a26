// Multi-turn router chat
use crate::shared::config::InferenceConfig;
use crate::shared::error::Result as InferenceResult;
use crate::shared::inference::CompletionOptions;
use crate::shared::{CompletionService, Conversation, InferenceClient, ModelResponse};
use anyhow::{Context, Result};
use std::future::Future;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub system_prompt: String,
    pub max_history_turns: usize,
    pub options: CompletionOptions,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Empty,
    Quit,
    Message(&'a str),
}

pub fn classify_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Input::Empty
    } else if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        Input::Quit
    } else {
        Input::Message(trimmed)
    }
}

/// Resolve `work`, or `None` if `interrupt` fires first.
pub async fn until_interrupted<T>(
    work: impl Future<Output = T>,
    interrupt: impl Future,
) -> Option<T> {
    tokio::select! {
        out = work => Some(out),
        _ = interrupt => None,
    }
}

/// Send one user message with a trimmed history window.
///
/// On success both turns stay in the full history; on failure the user turn
/// is dropped again so the next attempt starts clean.
pub async fn chat_turn(
    completion: &dyn CompletionService,
    conversation: &mut Conversation,
    max_history_turns: usize,
    message: &str,
) -> InferenceResult<ModelResponse> {
    conversation.push_user(message);
    let window = conversation.windowed(max_history_turns);

    match completion.complete(&window).await {
        Ok(response) => {
            conversation.push_assistant(response.content.clone());
            Ok(response)
        }
        Err(e) => {
            conversation.pop_user();
            Err(e)
        }
    }
}

pub async fn run(inference: InferenceConfig, settings: ChatSettings) -> Result<()> {
    info!("Starting router chat with deployment {}", inference.deployment);
    let client = InferenceClient::new(&inference)
        .context("failed to initialize inference client")?
        .with_options(settings.options);
    info!("Using inference endpoint: {}", client.url());

    let mut conversation = Conversation::new(settings.system_prompt);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Interactive chat started. Type 'exit' or 'quit' to stop.\n");

    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let line = match until_interrupted(lines.next_line(), tokio::signal::ctrl_c()).await {
            Some(line) => line?,
            None => None,
        };
        let Some(line) = line else {
            println!("\nExiting.");
            break;
        };

        match classify_input(&line) {
            Input::Empty => continue,
            Input::Quit => {
                println!("Goodbye.");
                break;
            }
            Input::Message(text) => {
                let turn = chat_turn(&client, &mut conversation, settings.max_history_turns, text);
                let Some(result) = until_interrupted(turn, tokio::signal::ctrl_c()).await else {
                    println!("\nExiting.");
                    break;
                };
                match result {
                    Ok(response) => {
                        let routed_model = response.model.as_deref().unwrap_or("<unknown>");
                        println!(
                            "\n[model: {}]\nAssistant: {}\n",
                            routed_model, response.content
                        );
                    }
                    Err(e) => {
                        error!("Chat request failed: {}", e);
                    }
                }
            }
        }
    }

    info!("Chat ended after {} messages", conversation.len());
    Ok(())
}
