use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use platformed_gateway::logging::{init_logging, LoggingConfig};
use platformed_gateway::{
    Bridge, ClientSession, EnvCredentialStore, Error, GatewayConfig, ProviderId, Router,
    SessionOptions,
};

/// Stream completions from a local Ollama daemon or a cloud LLM provider.
#[derive(Parser)]
#[command(name = "platformed-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a completion, printing text as it streams
    Generate {
        prompt: String,

        /// Provider to use (ollama, openai, anthropic, google); routed automatically if omitted
        #[arg(long)]
        provider: Option<ProviderId>,

        #[arg(long)]
        model: Option<String>,

        /// System prompt
        #[arg(long)]
        system: Option<String>,

        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long)]
        max_tokens: Option<u32>,
    },

    /// Check whether the local daemon is running
    Status,

    /// List the models a provider offers
    Models { provider: ProviderId },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Error> {
    init_logging(&LoggingConfig::from_env()?);

    let credentials = Arc::new(EnvCredentialStore::new().with_defaults());
    let router = Router::new(GatewayConfig::from_env()?, credentials)?;
    let bridge = Bridge::new(Arc::new(router));

    match cli.command {
        Command::Generate {
            prompt,
            provider,
            model,
            system,
            temperature,
            max_tokens,
        } => {
            let options = SessionOptions {
                system_prompt: system,
                temperature,
                max_tokens,
                provider,
                model,
            };
            generate(ClientSession::with_options(bridge, options), prompt).await
        }
        Command::Status => {
            if bridge.check_availability().await {
                println!("ollama: running");
            } else {
                println!("ollama: not running (start it with `ollama serve`)");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Models { provider } => {
            let models = bridge.list_models(provider).await;
            if models.is_empty() {
                eprintln!("No models available for {}", provider.display_name());
            }
            for model in models {
                println!("{model}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn generate(session: ClientSession<Bridge>, prompt: String) -> Result<ExitCode, Error> {
    let meta = session.generate(prompt).await?;
    let badge = if meta.is_local { "local" } else { "cloud" };
    eprintln!("[{} | {badge}]", meta.provider_id.display_name());

    let mut state = session.watch();
    let mut printed = 0;
    let mut stdout = std::io::stdout();

    loop {
        let snapshot = state.borrow_and_update().clone();
        if snapshot.output.len() > printed {
            print!("{}", &snapshot.output[printed..]);
            stdout.flush().ok();
            printed = snapshot.output.len();
        }

        if !snapshot.is_streaming {
            println!();
            if let Some(message) = snapshot.error {
                eprintln!("{message}");
                return Ok(ExitCode::FAILURE);
            }
            return Ok(ExitCode::SUCCESS);
        }

        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    return Ok(ExitCode::SUCCESS);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                session.cancel();
                eprintln!("\n[cancelled]");
                return Ok(ExitCode::SUCCESS);
            }
        }
    }
}
