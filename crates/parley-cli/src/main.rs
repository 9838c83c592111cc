//! parley - terminal client for the negotiation-chat demo

mod config;

use anyhow::Context as _;
use clap::Parser;
use std::io::Write as _;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use config::Config;
use parley_client::{
    Error, JsonFileStore, MemoryStore, Orchestrator, SessionStore, SseTransport, TurnContext,
    TurnHandler, TurnOutcome, TurnStatus,
};
use parley_wire::{ChatMessage, Persona, Record};

const DEFAULT_ENDPOINT: &str = "http://localhost:3001/api/chat/stream";
const HISTORY_KEY: &str = "messages";

/// parley - negotiate with an AI persona from the terminal
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Streaming chat endpoint URL
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Persona name (e.g. client, vendor)
    #[arg(short, long)]
    persona: Option<String>,

    /// Persona role description
    #[arg(long)]
    persona_role: Option<String>,

    /// Persona goal description
    #[arg(long)]
    persona_goal: Option<String>,

    /// Persona tone description
    #[arg(long)]
    persona_tone: Option<String>,

    /// Intent hint sent with the turn
    #[arg(short, long)]
    intent: Option<String>,

    /// Run a single turn with this message and exit
    #[arg(short, long)]
    message: Option<String>,

    /// Session file for conversation persistence across runs
    #[arg(short, long)]
    session: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "parley_cli=debug,parley_client=debug,parley_wire=debug,warn"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();

    let endpoint = args
        .endpoint
        .or(config.endpoint)
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    let persona = args.persona.or(config.persona);
    let persona_config = build_persona(
        args.persona_role.or(config.persona_role),
        args.persona_goal.or(config.persona_goal),
        args.persona_tone.or(config.persona_tone),
    );

    let mut store: Box<dyn SessionStore> = match args.session.or(config.session_file) {
        Some(path) => Box::new(
            JsonFileStore::open(&path).with_context(|| format!("opening session file {path}"))?,
        ),
        None => Box::new(MemoryStore::new()),
    };
    let mut messages = load_history(store.as_ref());

    let orchestrator = Orchestrator::new(Arc::new(SseTransport::new(endpoint)));

    if let Some(message) = args.message {
        run_one_turn(
            &orchestrator,
            &mut messages,
            store.as_mut(),
            &persona,
            &persona_config,
            &args.intent,
            message,
        )
        .await?;
        return Ok(());
    }

    println!("parley - type a message, or \"exit\" to quit");
    loop {
        print!("you> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }
        run_one_turn(
            &orchestrator,
            &mut messages,
            store.as_mut(),
            &persona,
            &persona_config,
            &args.intent,
            line.to_string(),
        )
        .await?;
    }

    Ok(())
}

fn build_persona(
    role: Option<String>,
    goal: Option<String>,
    tone: Option<String>,
) -> Option<Persona> {
    if role.is_none() && goal.is_none() && tone.is_none() {
        return None;
    }
    Some(Persona {
        role: role.unwrap_or_default(),
        goal: goal.unwrap_or_default(),
        tone: tone.unwrap_or_default(),
    })
}

fn load_history(store: &dyn SessionStore) -> Vec<ChatMessage> {
    let Some(value) = store.get(HISTORY_KEY) else {
        return Vec::new();
    };
    match serde_json::from_value(value) {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!("Ignoring unreadable session history: {}", e);
            Vec::new()
        }
    }
}

async fn run_one_turn(
    orchestrator: &Orchestrator,
    messages: &mut Vec<ChatMessage>,
    store: &mut dyn SessionStore,
    persona: &Option<String>,
    persona_config: &Option<Persona>,
    intent: &Option<String>,
    message: String,
) -> anyhow::Result<()> {
    messages.push(ChatMessage::user(message));

    let mut context = TurnContext::new(messages.clone());
    context.persona = persona.clone();
    context.persona_config = persona_config.clone();
    context.intent = intent.clone();

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let mut handler = ConsoleHandler::default();
    let status = orchestrator.run_turn(&context, &mut handler, cancel).await;
    watcher.abort();

    match status {
        TurnStatus::Completed => {
            messages.push(ChatMessage::assistant(handler.raw));
            if let Err(e) = store.set(HISTORY_KEY, serde_json::to_value(&*messages)?) {
                tracing::warn!("Failed to persist session history: {}", e);
            }
        }
        TurnStatus::Failed => {
            // Error already shown by the handler; drop the failed user turn
            // so a retry does not duplicate it.
            messages.pop();
        }
        TurnStatus::Cancelled => {
            println!("\n(interrupted)");
            messages.pop();
        }
    }

    Ok(())
}

/// Streams thinking narration to the terminal and renders records at the end
#[derive(Default)]
struct ConsoleHandler {
    /// Raw response text, accumulated for session history
    raw: String,
    /// How much of the thinking text has been printed already
    printed: usize,
    started_thinking: bool,
}

impl TurnHandler for ConsoleHandler {
    fn on_delta(&mut self, delta: &str) {
        self.raw.push_str(delta);
    }

    fn on_thinking(&mut self, thinking: &str) {
        if !self.started_thinking {
            println!("thinking:");
            self.started_thinking = true;
        }
        // Cumulative text only ever grows, so print the new tail.
        print!("{}", &thinking[self.printed..]);
        let _ = std::io::stdout().flush();
        self.printed = thinking.len();
    }

    fn on_complete(&mut self, outcome: TurnOutcome) {
        if self.started_thinking {
            println!();
        }
        if outcome.records.is_empty() {
            println!("(no structured response)");
            return;
        }
        for record in &outcome.records {
            print_record(record);
        }
    }

    fn on_error(&mut self, error: &Error) {
        eprintln!("error: {error}");
    }
}

fn print_record(record: &Record) {
    match record {
        Record::Markdown(widget) => println!("\n{}", widget.content),
        Record::Snapshot(widget) => {
            println!("\n== {} ==", widget.title);
            for field in &widget.fields {
                println!("  {}: {}", field.label, field.value);
            }
        }
        Record::Gateway(widget) => {
            println!("\n{}", widget.prompt);
            for (i, option) in widget.options.iter().enumerate() {
                match &option.description {
                    Some(description) => {
                        println!("  {}. {} - {}", i + 1, option.label, description);
                    }
                    None => println!("  {}. {}", i + 1, option.label),
                }
            }
        }
        Record::KeyPerson(widget) => {
            let title = widget.title.as_deref().unwrap_or("stakeholder");
            println!("\n[{}] {}", title, widget.name);
            if let Some(stance) = &widget.stance {
                println!("  stance: {stance}");
            }
        }
        Record::Comment(comment) => {
            if let Some(quote) = &comment.quote {
                println!("\n> {quote}");
            } else {
                println!();
            }
            let severity = comment.severity.as_deref().unwrap_or("note");
            println!("[{}] {}", severity, comment.body);
            if let Some(suggestion) = &comment.suggestion {
                println!("  suggestion: {suggestion}");
            }
        }
        Record::Unknown(value) => {
            println!(
                "\n(unrecognized record) {}",
                serde_json::to_string(value).unwrap_or_else(|_| "<unprintable>".to_string())
            );
        }
    }
}
