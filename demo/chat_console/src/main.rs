mod config;

use config::ConsoleConfig;
use switchboard_core::tools::native::register_builtin_tools;
use switchboard_core::{
    init_tracing, ChatMessage, ChatOptions, ChatOrchestrator, ConversationContext, TelemetryConfig,
    ToolRegistry,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::info;

const HELP: &str = "Commands: /status  /info  /stats  /reset  /quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(&TelemetryConfig::from_env());

    let cfg = ConsoleConfig::load();
    let registry = ToolRegistry::new();
    register_builtin_tools(&registry);

    let orchestrator = ChatOrchestrator::new(cfg.chat.clone(), registry);
    info!(
        target: "chat_console",
        model = %cfg.model,
        provider = ?cfg.provider,
        "Starting chat console"
    );

    let mut options = ChatOptions::default();
    if let Some(p) = &cfg.provider {
        options = options.with_provider(p.clone());
    }

    let mut ctx = ConversationContext::new();
    let mut history = vec![ChatMessage::system(cfg.system_prompt.clone())];
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{HELP}");
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" => break,
            "/status" => {
                for status in orchestrator.get_provider_status().await {
                    let mark = if status.available { "up" } else { "down" };
                    println!("{:<10} {mark}", status.provider);
                }
            }
            "/info" => {
                let info = orchestrator.get_chat_system_info();
                println!("{}", serde_json::to_string_pretty(&info)?);
            }
            "/stats" => {
                println!("{}", serde_json::to_string_pretty(&orchestrator.stats())?);
            }
            "/reset" => {
                history.truncate(1);
                ctx = ConversationContext::new();
                println!("(conversation cleared)");
            }
            _ if input.starts_with('/') => println!("{HELP}"),
            _ => {
                history.push(ChatMessage::user(input));
                let response = orchestrator
                    .handle_chat_request(&cfg.model, &history, &options, &mut ctx)
                    .await;

                if response.meta.fallback_used {
                    let original = response.meta.original_provider.as_deref().unwrap_or("?");
                    println!("[{} answered for {original}]", response.provider);
                }
                println!("{}\n", response.text);
                history.push(ChatMessage::assistant(response.text));
            }
        }
    }

    info!(
        target: "chat_console",
        turns = ctx.turn_count,
        avg_ms = ctx.average_duration_ms(),
        "Chat console stopped"
    );
    Ok(())
}
