//! Ragway — multi-provider LLM gateway server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ragway_chat::{LLMConfig, ProviderRegistry, TaskType};
use ragway_core::GatewayConfig;
use ragway_server::state::open_storage;
use ragway_server::{build_router, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn resolve_data_dir() -> PathBuf {
    std::env::var("RAGWAY_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn hours_arg(args: &[String], index: usize, default: u64) -> u64 {
    match args.get(index) {
        Some(raw) => match raw.parse() {
            Ok(hours) => hours,
            Err(_) => {
                eprintln!("Invalid hours value: {}", raw);
                std::process::exit(1);
            }
        },
        None => default,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let data_dir = resolve_data_dir();
    let config = GatewayConfig::from_env(&data_dir)?;

    // Handle CLI subcommands
    if args.len() > 1 {
        match args[1].as_str() {
            "validate" => {
                if args.len() < 4 {
                    eprintln!("Usage: ragway validate <provider> <model>");
                    std::process::exit(1);
                }
                let llm_config = LLMConfig::load(&config.data_paths.llm_config_file);
                let registry = ProviderRegistry::from_config(&llm_config);
                match registry.validate(&args[2], &args[3]) {
                    Ok(target) => {
                        println!("OK: {}", target);
                        return Ok(());
                    }
                    Err(e) => {
                        eprintln!("Rejected ({}): {}", e.kind(), e);
                        std::process::exit(1);
                    }
                }
            }
            "recommend" => {
                let name = args.get(2).map(String::as_str).unwrap_or("general");
                let Some(task) = TaskType::parse(name) else {
                    eprintln!("Unknown task type: {} (general, coding, creative, analysis, legal)", name);
                    std::process::exit(1);
                };
                let llm_config = LLMConfig::load(&config.data_paths.llm_config_file);
                let registry = ProviderRegistry::from_config(&llm_config);
                match registry.recommend(task) {
                    Ok(target) => {
                        println!("{}: {}", task, target);
                        return Ok(());
                    }
                    Err(e) => {
                        eprintln!("No recommendation ({}): {}", e.kind(), e);
                        std::process::exit(1);
                    }
                }
            }
            "prune" => {
                let hours = hours_arg(&args, 2, config.cache_max_age_hours);
                let (cache, _) = open_storage(&config);
                let removed = cache.prune(Duration::from_secs(hours.saturating_mul(3600)));
                println!("Pruned {} cache entries older than {}h", removed, hours);
                return Ok(());
            }
            "stats" => {
                let hours = hours_arg(&args, 2, 24);
                let (_, metrics) = open_storage(&config);
                let stats = metrics.aggregate(hours)?;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "windowHours": hours,
                        "providers": stats,
                    }))?
                );
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("Ragway — multi-provider LLM gateway");
                println!();
                println!("Usage: ragway [command]");
                println!();
                println!("Commands:");
                println!("  (none)                      Start the server");
                println!("  validate <provider> <model> Check a provider/model pair");
                println!("  recommend [task]            Preferred provider for a task type");
                println!("  prune [hours]               Delete cached responses older than hours");
                println!("  stats [hours]               Print per-provider metrics");
                println!("  help                        Show this help message");
                println!();
                println!("Data directory: $RAGWAY_DATA_DIR (default ./data)");
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'ragway help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    // Normal server startup
    info!("Data directory: {}", data_dir.display());

    let llm_config = LLMConfig::load(&config.data_paths.llm_config_file);
    let port = config.port;
    let state = Arc::new(AppState::new(config, &llm_config));

    let app = build_router(state.clone());

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Ragway gateway listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, flushing pending writes");
    state.gateway.flush().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
