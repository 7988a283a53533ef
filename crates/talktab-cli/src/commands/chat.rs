use std::borrow::Cow::{self, Borrowed, Owned};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use talktab_application::{
    ConversationError, ConversationService, ExchangeError, Orchestrator, ToolCatalogue,
};
use talktab_execution::{ExchangeEvent, ExchangeEventLayer};
use talktab_infrastructure::{JsonConversationRepository, TalktabPaths};
use talktab_interaction::{OpenAiReasoningEngine, ValidationClient};

use super::utils::bootstrap;

const COMMANDS: [&str; 4] = ["/schema", "/pending", "/sessions", "/help"];

/// rustyline helper: completion, highlighting and hints for slash commands.
#[derive(Clone)]
struct ChatHelper {
    commands: Vec<String>,
}

impl ChatHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Helper for ChatHelper {}

impl Completer for ChatHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('/') {
            return Ok((0, vec![]));
        }
        let candidates = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.clone(),
                replacement: cmd.clone(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Highlighter for ChatHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for ChatHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for ChatHelper {}

pub async fn run(config_path: Option<PathBuf>, session: Option<String>) -> Result<()> {
    let (event_layer, mut events) = ExchangeEventLayer::channel();
    let config = bootstrap(config_path, Some(event_layer))?;

    // ===== Backend =====
    let validator = ValidationClient::from_config(&config.validator)
        .context("Failed to create validation client")?;
    if !validator.health_check().await {
        println!(
            "{}",
            format!(
                "Warning: validator at {} is not responding; schema edits will fail until it is.",
                config.validator.base_url
            )
            .yellow()
        );
    }

    let engine = OpenAiReasoningEngine::from_config(&config.llm)
        .context("Failed to create reasoning engine (is OPENAI_API_KEY set?)")?;
    let catalogue = Arc::new(ToolCatalogue::new(Arc::new(validator)));
    let orchestrator = Orchestrator::new(Arc::new(engine), catalogue, &config.orchestrator);

    let conversations_dir =
        TalktabPaths::conversations_dir().context("Failed to resolve conversations directory")?;
    let repository = Arc::new(JsonConversationRepository::new(conversations_dir));
    let service = ConversationService::new(repository, orchestrator);

    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let state = service
        .snapshot(&session_id)
        .await
        .with_context(|| format!("Failed to open conversation '{session_id}'"))?;

    // ===== REPL =====
    let mut rl = Editor::new()?;
    rl.set_helper(Some(ChatHelper::new()));

    println!("{}", "=== Talking Tables ===".bright_magenta().bold());
    println!("{}", format!("Session: {session_id}").bright_black());
    if !state.messages().is_empty() {
        println!(
            "{}",
            format!("Resumed conversation with {} messages.", state.messages().len()).bright_black()
        );
    }
    println!(
        "{}",
        "Describe the schema change you want, 'help' for commands, or 'quit' to exit."
            .bright_black()
    );
    println!();

    loop {
        let readline = rl.readline(">> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();

                if trimmed == "quit" || trimmed == "exit" {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }

                if trimmed.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(&line);

                match trimmed {
                    "help" | "/help" => print_help(),
                    "/schema" => {
                        let state = service.snapshot(&session_id).await?;
                        print_schema("Accepted schema", state.accepted_schema());
                    }
                    "/pending" => {
                        let state = service.snapshot(&session_id).await?;
                        print_schema("Pending schema", state.pending_schema());
                    }
                    "/sessions" => {
                        for id in service.list_sessions().await? {
                            let marker = if id == session_id { "*" } else { " " };
                            println!("{} {}", marker, id);
                        }
                    }
                    input => send(&service, &session_id, input, &mut events).await,
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    Ok(())
}

/// Runs one exchange, printing tool activity as it happens. Ctrl-C cancels.
async fn send(
    service: &ConversationService,
    session_id: &str,
    input: &str,
    events: &mut mpsc::UnboundedReceiver<ExchangeEvent>,
) {
    let cancel = CancellationToken::new();
    let exchange = service.send(session_id, input, &cancel);
    tokio::pin!(exchange);

    let result = loop {
        tokio::select! {
            result = &mut exchange => break result,
            Some(event) = events.recv() => print_event(&event),
            _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                println!("{}", "Cancelling...".yellow());
                cancel.cancel();
            }
        }
    };
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }

    match result {
        Ok(outcome) => {
            for line in outcome.reply.lines() {
                println!("{}", line.bright_blue());
            }
            println!();
        }
        Err(ConversationError::Exchange(ExchangeError::Cancelled)) => {
            println!("{}", "Cancelled. The conversation is unchanged.".yellow());
        }
        Err(ConversationError::Exchange(err @ ExchangeError::StepLimitExceeded { .. })) => {
            println!(
                "{}",
                format!("{err}. Progress so far was kept; ask again to continue.").yellow()
            );
        }
        Err(ConversationError::Exchange(ExchangeError::Reasoning(err))) if err.is_retryable() => {
            let wait = err
                .retry_after()
                .map(|d| format!(" in {}s", d.as_secs().max(1)))
                .unwrap_or_default();
            println!(
                "{}",
                format!("The assistant is busy ({err}). Nothing was changed; try again{wait}.")
                    .yellow()
            );
        }
        Err(err) => {
            eprintln!("{}", format!("Error: {err}").red());
        }
    }
}

fn print_event(event: &ExchangeEvent) {
    match event.message.as_str() {
        "Tool finished" => {
            let tool = event.field_str("tool").unwrap_or("tool");
            let status = event.field_str("status").unwrap_or("unknown");
            let line = format!("  [{tool}] {status}");
            if status == "success" {
                println!("{}", line.bright_black());
            } else {
                println!("{}", line.yellow());
            }
        }
        "Rejected malformed tool invocation" => {
            let tool = event.field_str("tool").unwrap_or("tool");
            println!("{}", format!("  [{tool}] invalid invocation").yellow());
        }
        "Validator transport failure" => {
            let attempt = event.fields.get("attempt").cloned().unwrap_or_default();
            let max = event.fields.get("max_attempts").cloned().unwrap_or_default();
            println!(
                "{}",
                format!("  validator unreachable (attempt {attempt}/{max})").yellow()
            );
        }
        _ => {}
    }
}

fn print_schema(title: &str, schema: &str) {
    println!("{}", format!("{title}:").bright_magenta());
    if schema.trim().is_empty() {
        println!("{}", "  (empty)".bright_black());
    } else {
        for line in schema.lines() {
            println!("  {line}");
        }
    }
    println!();
}

fn print_help() {
    println!("{}", "Commands:".bright_magenta());
    println!("  /schema    show the accepted schema");
    println!("  /pending   show the last proposed schema that was not accepted");
    println!("  /sessions  list stored conversations");
    println!("  help       show this help");
    println!("  quit       exit (also: exit, Ctrl-D)");
    println!();
    println!(
        "{}",
        "Anything else is sent to the assistant. Ctrl-C cancels a running request.".bright_black()
    );
    println!();
}
