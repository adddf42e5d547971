use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use database_layer::DatabasePool;
use pharmacy_server::auth::{JwtService, Role};
use pharmacy_server::config::{AppConfig, LogFormat, LoggingSettings};
use pharmacy_server::{create_app, PharmacyServer};
use std::io::IsTerminal;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Pharmacy operations HTTP server
#[derive(Parser, Debug)]
#[command(name = "pharmacy-server", version)]
#[command(about = "Prescription fulfillment, inventory, pricing and payments API")]
struct Args {
    /// Configuration file path (YAML)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Override the bind address
    #[arg(long, global = true)]
    host: Option<String>,

    /// Override the port
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Apply bundled database migrations and exit
    Migrate,
    /// Print a signed bearer token
    IssueToken {
        #[arg(long)]
        user_id: i64,
        /// pharmacy, doctor, patient or admin
        #[arg(long)]
        role: Role,
        /// Lifetime in seconds, defaults to auth.token_ttl_secs
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            init_tracing(&config.logging, args.verbose)?;
            serve(config).await
        }
        Command::Migrate => {
            init_tracing(&config.logging, args.verbose)?;
            migrate(&config).await
        }
        Command::IssueToken {
            user_id,
            role,
            ttl_secs,
        } => {
            config.validate()?;
            let token = JwtService::new(&config.auth).issue(user_id, role, ttl_secs)?;
            println!("{token}");
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    config.validate()?;

    info!("{}", "Starting pharmacy server".bright_cyan());
    info!("Version: {}", env!("CARGO_PKG_VERSION").bright_white());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid bind address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let server = PharmacyServer::connect(config).await?;
    let app = create_app(server);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!("{}", format!("Listening on http://{addr}").bright_green());
    info!("{}", format!("Health check: http://{addr}/health").bright_blue());
    info!("{}", format!("API docs: http://{addr}/swagger-ui").bright_blue());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn migrate(config: &AppConfig) -> Result<()> {
    if config.database.url.trim().is_empty() {
        anyhow::bail!("database.url must be set (DATABASE_URL)");
    }
    let pool = DatabasePool::new(&config.database.url, &config.database.pool_settings()).await?;
    pool.run_migrations().await?;
    pool.close().await;
    info!("{}", "Migrations applied".bright_green());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_tracing(settings: &LoggingSettings, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let directives = settings.filter.clone().unwrap_or_else(|| {
        format!("pharmacy_server={level},database_layer={level},tower_http=info,sqlx=warn")
    });
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directives))
        .context("invalid log filter")?;

    match settings.format {
        LogFormat::Pretty => {
            let use_colors = std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal();
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_line_number(true)
                        .with_timer(ChronoUtc::rfc_3339())
                        .with_ansi(use_colors),
                )
                .try_init()?;
            if use_colors {
                print_startup_banner();
            }
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_timer(ChronoUtc::rfc_3339())
                        .with_ansi(false)
                        .json(),
                )
                .try_init()?;
        }
    }

    Ok(())
}

fn print_startup_banner() {
    println!("{}", "╔════════════════════════════════════════════╗".bright_cyan());
    println!("{}", "║              PHARMACY SERVER               ║".bright_cyan());
    println!("{}", "║   prescriptions · inventory · payments     ║".bright_cyan());
    println!("{}", "╚════════════════════════════════════════════╝".bright_cyan());
    println!();
}
