use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use airline_agents::guardrail::rule_guardrails;
use airline_agents::{
    AgentRegistry, AgentsError, AirlineConfig, HandoffGraph, LogFormat, OpenAIProvider, RunConfig,
    Runner, TurnResult, TurnService,
};
use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tower::{Service, ServiceExt};
use tracing_subscriber::EnvFilter;

/// Exit code for a message blocked by a guardrail.
const BLOCKED_EXIT: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "airline-agents", version, about = "Airline customer-service agents")]
struct Cli {
    /// Message handed to the triage agent
    #[arg(default_value = "I need to change my seat on a flight.")]
    prompt: String,

    /// Keep reading messages from stdin after the first prompt
    #[arg(short, long)]
    interactive: bool,

    /// TOML file with non-secret settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Use keyword guardrails instead of classifier calls
    #[arg(long)]
    rule_guardrails: bool,
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn print_turn(turn: &TurnResult) {
    if turn.requested_seat_map() {
        println!("[seat map] Opening the interactive seat picker.");
    }
    println!("{}: {}", turn.last_agent, turn.final_output);
}

/// Runs one turn. Returns `false` when a guardrail blocked the message.
async fn submit(service: &mut TurnService, input: String) -> anyhow::Result<bool> {
    match service.ready().await?.call(input).await {
        Ok(turn) => {
            print_turn(&turn);
            tracing::debug!(usage = %turn.usage.summary(), "Turn usage");
            Ok(true)
        }
        Err(AgentsError::InputGuardrailTriggered {
            guardrail,
            reasoning,
        }) => {
            println!("Request blocked by {guardrail}: {reasoning}");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AirlineConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AirlineConfig::from_env()?,
    };
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    init_logging(config.log_format);

    let provider = Arc::new(OpenAIProvider::new(&config.api_key, &config.base_url));
    let runner = if cli.rule_guardrails {
        Runner::new(
            AgentRegistry::airline_with_guardrails(&config, rule_guardrails()),
            HandoffGraph::airline_default(),
            provider,
        )
        .with_config(RunConfig::from(&config))
    } else {
        Runner::airline(&config, provider)
    };

    let mut service = TurnService::fresh(Arc::new(runner));
    let accepted = submit(&mut service, cli.prompt.clone()).await?;
    if !cli.interactive {
        return Ok(if accepted {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(BLOCKED_EXIT)
        });
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }
        // A blocked message is recoverable here; the user can rephrase.
        submit(&mut service, line.to_string()).await?;
    }
    Ok(ExitCode::SUCCESS)
}
