use std::io::{self, BufRead, Write};

use anyhow::bail;
use serde_json::json;
use tracing::{error, info, level_filters::LevelFilter};

mod beats;
mod clipmap;
mod llm;
mod media;
mod otio;
mod render;
mod tools;

use tools::ToolContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .init();

    let ctx = ToolContext::from_env();
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        None => repl(&ctx).await,
        Some("autocut") => {
            let status = render::run_autocut(&ctx).await?;
            info!("{status}");
            Ok(())
        }
        Some("export") => {
            let status = tools::export_timeline(&ctx)?;
            info!("{status}");
            Ok(())
        }
        Some("sync") => {
            let status = tools::sync_from_otio(&ctx, args.get(1).map(String::as_str))?;
            info!("{status}");
            Ok(())
        }
        Some("clipmap") => {
            let status = tools::regenerate_clip_map(&ctx)?;
            info!("{status}");
            Ok(())
        }
        Some(other) => {
            bail!("unknown command '{other}' (expected autocut, export, sync or clipmap)")
        }
    }
}

/// Conversational front end. The model picks which operation to run;
/// every outcome comes back as a status string, so the loop only ends
/// on user request or end of input.
async fn repl(ctx: &ToolContext) -> anyhow::Result<()> {
    let client = llm::ChatClient::from_env();
    println!(
        "Cue-sheet agent connected to {}.\nType 'exit' to quit.\n",
        client.base_url()
    );

    let stdin = io::stdin();
    let mut history: Vec<serde_json::Value> = Vec::new();

    loop {
        print!("You: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let user = line.trim();
        if user.is_empty() {
            continue;
        }
        if matches!(user.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        history.push(json!({ "role": "user", "content": user }));
        let message = match client.chat(&history).await {
            Ok(message) => message,
            Err(e) => {
                error!("chat request failed: {e:#}");
                continue;
            }
        };

        if let Some(call) = message.function_call {
            println!("-> calling {}({})", call.name, call.arguments);
            let result = tools::dispatch(ctx, &call.name, &call.arguments).await;
            history.push(json!({
                "role": "assistant",
                "content": null,
                "function_call": { "name": call.name, "arguments": call.arguments },
            }));
            history.push(json!({ "role": "function", "name": call.name, "content": result }));
            println!("{result}\n");
        } else {
            let content = message.content.unwrap_or_default();
            println!("{content}\n");
            history.push(json!({ "role": "assistant", "content": content }));
        }
    }

    Ok(())
}
