use anyhow::{anyhow, Context, Result};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use dotenvy::dotenv;
use log::info;
use std::sync::Arc;

use crmserver::api_router::build_router;
use crmserver::config::AppConfig;
use crmserver::seed;
use crmserver::shared::state::AppState;
use crmserver::shared::utils::{create_conn, DbPool};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

fn print_usage() {
    eprintln!("Usage: crmserver [COMMAND]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  serve                            Start the HTTP server (default)");
    eprintln!("  seed                             Load idempotent demo data");
    eprintln!("  send-followup-reminders [--dry-run]");
    eprintln!("                                   Mail each salesperson their due follow-ups");
}

fn connect(config: &AppConfig) -> Result<DbPool> {
    let pool = create_conn(&config.database_url()).context("failed to build database pool")?;
    let mut conn = pool.get().context("failed to check out a connection")?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!("migrations failed: {e}"))?;
    Ok(pool)
}

async fn serve(config: AppConfig) -> Result<()> {
    let pool = connect(&config)?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState { conn: pool, config });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {addr}");
    axum::serve(listener, app.into_make_service())
        .await
        .context("server error")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("serve");
    let config = AppConfig::from_env()?;

    match command {
        "serve" => serve(config).await,
        "seed" => {
            let pool = connect(&config)?;
            let mut conn = pool.get().context("failed to check out a connection")?;
            seed::run(&mut conn)
        }
        "send-followup-reminders" => {
            let dry_run = args.iter().any(|a| a == "--dry-run");
            let pool = connect(&config)?;
            let mut conn = pool.get().context("failed to check out a connection")?;
            seed::reminders::send_due_reminders(&mut conn, &config.mail, dry_run)
        }
        "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            Err(anyhow!("unknown command: {other}"))
        }
    }
}
