//! # pilotcraft CLI
//!
//! Interactive sessions that let a model fly a simulated drone or draw on a
//! turtle canvas.
//!
//! Usage:
//!   pilotcraft drone
//!   pilotcraft drone --mission-prompt --max-steps 10
//!   pilotcraft drone --once "connect to the drone"
//!   pilotcraft turtle --output drawing.svg
//!
//! The model endpoint is any OpenAI-compatible server, a local Ollama by
//! default. `.env` in the working directory is read first.

mod logging;
mod repl;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use pilotcraft_agent::{Agent, AgentConfig, AgentOutcome, DroneSession, ToolRegistry, TurtleSession};
use pilotcraft_core::provider::{DEFAULT_API_KEY, DEFAULT_BASE_URL, DEFAULT_MODEL};
use pilotcraft_core::{
    BridgeConfig, DroneConfig, LlmProvider, OpenAIProvider, ProviderConfig, SimConfig, SimulatedVehicle,
    SystemAddress,
};
use repl::{Interrupt, Repl, DEFAULT_PROMPT, MISSION_PROMPT};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncBufRead;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "pilotcraft")]
#[command(author, version, about = "pilotcraft - talk a drone or a turtle through its moves")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// OpenAI-compatible endpoint (Ollama's /v1 is appended when missing)
    #[arg(long, global = true, env = "OLLAMA_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Model name
    #[arg(long, global = true, env = "OLLAMA_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// API key sent as a bearer token
    #[arg(long, global = true, env = "OLLAMA_API_KEY", default_value = DEFAULT_API_KEY, hide_env_values = true)]
    api_key: String,

    /// Model round-trips allowed per instruction
    #[arg(long, global = true)]
    max_steps: Option<usize>,

    /// Show every tool call and debug logs
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fly the simulated drone
    Drone {
        /// Vehicle connection address
        #[arg(long, default_value = "udp://:14540")]
        system_address: String,

        /// Ask for whole missions and let the agent chain several steps
        #[arg(long)]
        mission_prompt: bool,

        /// Run one instruction and exit
        #[arg(long)]
        once: Option<String>,
    },
    /// Draw with the turtle
    Turtle {
        /// Write the drawing as SVG on exit
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    fn provider_config(&self) -> ProviderConfig {
        ProviderConfig::ollama(&self.base_url)
            .with_model(&self.model)
            .with_api_key(&self.api_key)
    }

    fn agent_config(&self, base: AgentConfig) -> AgentConfig {
        match self.max_steps {
            Some(max_steps) => base.with_max_steps(max_steps),
            None => base,
        }
    }
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    logging::init_logging(logging::default_level(cli.verbose));

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let result = runtime.block_on(run(cli));
    // A pending stdin read must not hold the process open
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let provider = OpenAIProvider::new(cli.provider_config())?;
    info!(provider = provider.name(), model = provider.default_model(), "provider ready");
    let interrupt = Interrupt::ctrl_c();

    match &cli.command {
        Commands::Drone {
            system_address,
            mission_prompt,
            once,
        } => {
            let address: SystemAddress = system_address.parse()?;
            let base = if *mission_prompt {
                AgentConfig::mission()
            } else {
                AgentConfig::drone()
            };
            let mut agent = Agent::new(provider, cli.agent_config(base));
            let backend = Arc::new(SimulatedVehicle::new(SimConfig::default()));
            let session = DroneSession::new(
                backend,
                DroneConfig::default().with_address(address),
                BridgeConfig::default(),
            )?;

            let input = match once {
                Some(instruction) => Input::Once(instruction.clone()),
                None => {
                    let prompt = if *mission_prompt { MISSION_PROMPT } else { DEFAULT_PROMPT };
                    println!("Drone agent ready. Type 'quit' or 'exit' to end the session.\n");
                    Input::Interactive(Repl::stdin(prompt, interrupt.clone()))
                }
            };
            let result = run_drone(&mut agent, &session, input, interrupt, cli.verbose).await;
            info!(total_tokens = agent.usage().total_tokens(), "drone session closed");
            result
        }
        Commands::Turtle { output } => {
            let mut agent = Agent::new(provider, cli.agent_config(AgentConfig::turtle()));
            let session = TurtleSession::default();

            println!("Turtle agent ready. Type 'quit' or 'exit' to end the session.\n");
            let repl = Repl::stdin(DEFAULT_PROMPT, interrupt.clone());
            let result = run_turtle(&mut agent, &session, repl, interrupt, output.as_deref(), cli.verbose).await;
            info!(
                segments = session.snapshot().segments().len(),
                total_tokens = agent.usage().total_tokens(),
                "turtle session closed"
            );
            result
        }
    }
}

/// Where a session's instructions come from
enum Input<R> {
    Once(String),
    Interactive(Repl<R>),
}

/// Run the instructions, then stop the bridge whichever way the session
/// ended.
async fn run_drone<P, R>(
    agent: &mut Agent<P>,
    session: &DroneSession,
    input: Input<R>,
    mut interrupt: Interrupt,
    verbose: bool,
) -> anyhow::Result<()>
where
    P: LlmProvider,
    R: AsyncBufRead + Unpin,
{
    let result = match input {
        Input::Once(instruction) => execute(agent, session.tools(), &instruction, &mut interrupt, verbose)
            .await
            .map(|_| ()),
        Input::Interactive(repl) => interact(agent, session.tools(), repl, interrupt, verbose).await,
    };

    session.close()?;
    result
}

async fn run_turtle<P, R>(
    agent: &mut Agent<P>,
    session: &TurtleSession,
    repl: Repl<R>,
    interrupt: Interrupt,
    output: Option<&Path>,
    verbose: bool,
) -> anyhow::Result<()>
where
    P: LlmProvider,
    R: AsyncBufRead + Unpin,
{
    let result = interact(agent, session.tools(), repl, interrupt, verbose).await;

    if let Some(path) = output {
        session.save_svg(path)?;
        println!("Drawing saved to {}", path.display());
    }
    result
}

/// Feed every line to the agent. Failures are printed and the loop goes on;
/// Ctrl-C ends it even while the model is still answering.
async fn interact<P, R>(
    agent: &mut Agent<P>,
    tools: &ToolRegistry,
    mut repl: Repl<R>,
    mut interrupt: Interrupt,
    verbose: bool,
) -> anyhow::Result<()>
where
    P: LlmProvider,
    R: AsyncBufRead + Unpin,
{
    while let Some(command) = repl.next_command().await? {
        match execute(agent, tools, &command, &mut interrupt, verbose).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                warn!(error = %e, "instruction failed");
                eprintln!("Error: {}", e);
            }
        }
    }
    Ok(())
}

/// `Ok(false)` when Ctrl-C cut the instruction short
async fn execute<P: LlmProvider>(
    agent: &mut Agent<P>,
    tools: &ToolRegistry,
    command: &str,
    interrupt: &mut Interrupt,
    verbose: bool,
) -> anyhow::Result<bool> {
    let outcome = tokio::select! {
        biased;
        _ = interrupt.triggered() => {
            println!();
            info!(command, "instruction interrupted");
            return Ok(false);
        }
        outcome = agent.run(tools, command) => outcome?,
    };
    print_outcome(&outcome, verbose);
    Ok(true)
}

fn print_outcome(outcome: &AgentOutcome, verbose: bool) {
    if verbose {
        for observation in &outcome.observations {
            println!("  {}({}) -> {}", observation.tool, observation.arguments, observation.output);
        }
    }
    match outcome.summary() {
        Some(summary) if !summary.is_empty() => println!("Agent: {}\n", summary),
        _ => println!("Agent: (no response)\n"),
    }
}
