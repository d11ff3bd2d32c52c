//! fence-lsp - Language intelligence for fenced code in markdown
//!
//! Command-line front end over the aggregator. Every command prints one
//! JSON object on stdout.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fence_lsp::app::App;
use fence_lsp::cli::{Cli, Commands};

fn main() {
    // Quiet by default; use RUST_LOG=fence_lsp=debug for backend traffic
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fence_lsp=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!(
                r#"{{"success":false,"error":"Failed to create runtime: {}"}}"#,
                e
            );
            std::process::exit(1);
        }
    };
    let result = runtime.block_on(async_main());

    if let Err(e) = result {
        let response = serde_json::json!({
            "success": false,
            "error": format!("{e:#}")
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&response)
                .unwrap_or_else(|_| format!(r#"{{"success":false,"error":"{}"}}"#, e))
        );
        std::process::exit(2);
    }
}

async fn async_main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let app = App::new(cli.root)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize: {:#}", e))?;

    let result = execute_command(cli.command, &app).await;

    // Backends never outlive the invocation, even when the command failed
    app.shutdown().await;
    result
}

async fn execute_command(command: Commands, app: &App) -> anyhow::Result<()> {
    use fence_lsp::cli::commands;

    match command {
        Commands::Languages(args) => commands::languages::execute(args, app).await,
        Commands::Fences(args) => commands::fences::execute(args, app).await,
        Commands::Hover(args) => commands::hover::execute(args, app).await,
        Commands::Complete(args) => commands::complete::execute(args, app).await,
        Commands::Hint(args) => commands::hint::execute(args, app).await,
        Commands::Status(args) => commands::status::execute(args, app).await,
    }
}
