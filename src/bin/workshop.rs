use std::io::{self, BufReader, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use agent_workshop::{
    Agent, AnthropicModel, ChannelReader, ConversationLoop, LineReader, LoopExit, ReplError,
    TerminalReader, WorkshopConfig, builtin_tools,
};
use anyhow::Context;
use clap::Parser;
use futures_util::FutureExt;
use tracing::{info, warn};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkshopConfig::parse();

    // Logs go to stderr so they never interleave with the transcript.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    println!("{}", "=".repeat(60));
    println!("Agents Workshop - Terminal Chat");
    println!("{}", "=".repeat(60));
    println!();
    println!("Initializing agent...");

    match initialize_agent(&config) {
        Ok(mut agent) => {
            println!("Agent ready!\n");
            print_hints(&config, &agent);
            if let Err(err) = chat(&mut agent).await {
                println!("\nError: {err}");
            }
        }
        Err(err) => {
            println!("\nError: {err:#}");
            println!("\nMake sure you have:");
            println!("1. Set ANTHROPIC_API_KEY (or passed --api-key)");
            println!("2. Chosen a model id your key can use (--model / ANTHROPIC_MODEL)");
            println!("3. Network access to the API endpoint");
        }
    }

    println!("\nGoodbye!");
    Ok(())
}

fn initialize_agent(config: &WorkshopConfig) -> anyhow::Result<Agent> {
    let model = AnthropicModel::new(config.anthropic_config()?)
        .context("failed to create the Anthropic client")?;
    info!(model = model.model_id(), "model configured");

    let mut builder = Agent::builder()
        .model(model)
        .system_prompt(config.system_prompt.clone())
        .conversation_manager(config.conversation_manager());

    if !config.no_tools {
        builder = builder.tools(builtin_tools()?);
    }
    if let Some(session) = config.session()? {
        info!(path = %session.path().display(), "using file session");
        builder = builder.session(session);
    }

    Ok(builder.build()?)
}

fn print_hints(config: &WorkshopConfig, agent: &Agent) {
    println!("Type 'exit', 'quit' or 'bye' to end the conversation.");
    if !config.no_tools {
        println!("Try asking: what is 42 + 9?");
    }
    if let Some(session) = agent.session() {
        println!(
            "Session '{}' holds {} messages. Tell your name, restart, and ask it again!",
            session.session_id(),
            agent.messages_len()
        );
    }
    println!();
}

async fn chat(agent: &mut Agent) -> Result<LoopExit, ReplError> {
    let interrupt = Interrupt::listen();
    if io::stdin().is_terminal() {
        run_loop(TerminalReader::new()?, agent, interrupt).await
    } else {
        let stdin = BufReader::new(io::stdin());
        let reader = ChannelReader::spawn(stdin, io::stdout(), interrupt.flag());
        run_loop(reader, agent, interrupt).await
    }
}

async fn run_loop<R: LineReader>(
    reader: R,
    agent: &mut Agent,
    interrupt: Interrupt,
) -> Result<LoopExit, ReplError> {
    ConversationLoop::new(reader, io::stdout())
        .run(agent, interrupt.raised())
        .await
}

/// Ctrl+C listener installed before the first prompt, so the signal is
/// never delivered with the default handler in place.
struct Interrupt {
    flag: Arc<AtomicBool>,
    raised: oneshot::Receiver<()>,
}

impl Interrupt {
    fn listen() -> Self {
        let flag = Arc::new(AtomicBool::new(false));
        let (tx, raised) = oneshot::channel();
        let task_flag = flag.clone();

        // The first poll registers the handler; do it here rather than
        // whenever the spawned task gets scheduled.
        let mut ctrl_c = Box::pin(tokio::signal::ctrl_c());
        let early = (&mut ctrl_c).now_or_never();

        tokio::spawn(async move {
            let received = match early {
                Some(result) => result,
                None => ctrl_c.await,
            };
            match received {
                Ok(()) => {
                    task_flag.store(true, Ordering::SeqCst);
                    // the loop may have finished already
                    let _ = tx.send(());
                }
                // dropping `tx` here would read as an interrupt
                Err(err) => {
                    warn!(error = %err, "cannot listen for Ctrl+C");
                    std::future::pending::<()>().await;
                }
            }
        });
        Self { flag, raised }
    }

    /// Set once Ctrl+C has been received.
    fn flag(&self) -> Arc<AtomicBool> {
        self.flag.clone()
    }

    /// Resolves on Ctrl+C; never resolves if the handler cannot be installed.
    async fn raised(self) {
        if self.raised.await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
