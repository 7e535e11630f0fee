use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use provy_agent::AgentRuntime;
use provy_cloud::{CloudProvider, HttpCloud, MemoryCloud};
use provy_core::config::{AppConfig, LoadOptions, ProviderMode};
use provy_core::knowledge::KnowledgeBase;

use crate::commands::CommandResult;

const KNOWLEDGE_PATH: &str = "knowledge.toml";

pub fn run(user: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    crate::init_logging(&config);

    let knowledge = match KnowledgeBase::load(Path::new(KNOWLEDGE_PATH)) {
        Ok(knowledge) => knowledge,
        Err(error) => {
            tracing::warn!(error = %error, "knowledge base unreadable, using builtin content");
            KnowledgeBase::builtin()
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let outcome = runtime.block_on(async {
        match config.provider.mode {
            ProviderMode::Memory => {
                tracing::info!(region = %config.provider.region, "chat using in-memory provider");
                let provider = Arc::new(MemoryCloud::new(config.provider.region.clone()));
                let agent =
                    AgentRuntime::new(provider, knowledge, config.network.route_table_mode);
                chat_loop(&agent, user).await
            }
            ProviderMode::Http => {
                let Some(base_url) = config.provider.base_url.clone() else {
                    return Err(("config_validation", "provider.base_url is not set".to_string(), 2));
                };
                let Some(api_token) = config.provider.api_token.clone() else {
                    return Err(("config_validation", "provider.api_token is not set".to_string(), 2));
                };
                let client = HttpCloud::new(
                    base_url,
                    api_token,
                    config.provider.region.clone(),
                    config.provider.timeout_secs,
                    config.provider.max_retries,
                )
                .map_err(|error| ("provider_init", error.to_string(), 4u8))?;
                if let Err(error) = client.ping().await {
                    return Err(("provider_unreachable", error.to_string(), 4));
                }
                let agent = AgentRuntime::new(
                    Arc::new(client),
                    knowledge,
                    config.network.route_table_mode,
                );
                chat_loop(&agent, user).await
            }
        }
    });

    match outcome {
        Ok(()) => CommandResult { exit_code: 0, output: String::new() },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}

async fn chat_loop<P: CloudProvider + 'static>(
    agent: &AgentRuntime<P>,
    user: &str,
) -> Result<(), (&'static str, String, u8)> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    println!("provy ready - describe what you need, or type `help`. `exit` leaves the session.");
    loop {
        print!("provy> ");
        stdout.flush().map_err(|error| ("io", error.to_string(), 3u8))?;

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .map_err(|error| ("io", error.to_string(), 3u8))?;
        if read == 0 {
            break;
        }

        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if matches!(message, "exit" | "quit") {
            break;
        }

        let reply = agent.handle_message(user, message).await;
        println!("{reply}");
    }

    Ok(())
}
