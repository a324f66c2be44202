use std::{future::IntoFuture, net::SocketAddr, path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use routekit::{
    adapters::build_engine,
    config::{EngineConfig, EngineConfigValidator, load_config},
    tracing_setup,
    utils::graceful_shutdown::GracefulShutdown,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "routekit.toml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "routekit.toml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "routekit.toml")]
        config: String,
    },
    /// Start the dispatch server (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "routekit.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config }) => validate_config_command(&config),
        Some(Commands::Init { config }) => init_config_command(&config).await,
        Some(Commands::Serve { config }) => serve(&config).await,
        None => serve(&args.config).await,
    }
}

async fn serve(config_path: &str) -> Result<()> {
    let config = load_config(config_path)
        .with_context(|| format!("Failed to load config from {config_path}"))?;

    tracing_setup::init_tracing(&config.logging.level, config.logging.json)
        .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;

    EngineConfigValidator::validate(&config)
        .with_context(|| format!("Invalid configuration in {config_path}"))?;

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .context("Failed to parse listen address")?;

    let engine = build_engine(&config).context("Failed to build dispatch engine")?;
    if let Some(registry) = engine.registry() {
        for (method, pattern) in registry.routes() {
            tracing::info!("Configured route: [{}]:{}", method, pattern);
        }
    }

    let graceful_shutdown = Arc::new(GracefulShutdown::new());
    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        signal_handler_shutdown.run_signal_handler().await;
    });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    tracing::info!("routekit server starting on {}", addr);

    let drain_shutdown = graceful_shutdown.clone();
    let server = axum::serve(
        listener,
        engine
            .into_router()
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let reason = drain_shutdown.wait_for_shutdown_signal().await;
        tracing::info!("Shutdown signal received: {:?}, draining connections", reason);
    });

    tokio::select! {
        result = server.into_future() => {
            result.context("Server error")?;
            tracing::info!("Graceful shutdown completed");
        }
        _ = async {
            graceful_shutdown.wait_for_shutdown_signal().await;
            tokio::time::sleep(graceful_shutdown.shutdown_timeout()).await;
        } => {
            tracing::error!(
                "Shutdown timeout exceeded ({:?}), forcing shutdown",
                graceful_shutdown.shutdown_timeout()
            );
        }
    }

    Ok(())
}

/// Validate configuration file and exit
fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config: EngineConfig = match load_config(config_path) {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e}");
            std::process::exit(1);
        }
    };

    match EngineConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            println!(
                "   • API Version: {}",
                if config.api_version.is_empty() {
                    "(none)"
                } else {
                    config.api_version.as_str()
                }
            );
            println!("   • Routes: {}", config.routes.len());
            println!("   • Request IDs: {}", config.middleware.request_id);
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Route patterns and the API version must start with '/'");
            println!("   • Proxy targets need a scheme (http:// or https://) or a leading '/'");
            println!("   • Verify listen address format (e.g., '127.0.0.1:3000')");
            println!("   • Durations use humantime units (ms, s, m)");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# routekit configuration

# The address to listen on
listen_addr = "127.0.0.1:8080"

# Prefix applied to every route pattern below
api_version = ""

[logging]
level = "info"
json = false
slow_request_threshold = "1s"

[middleware]
request_logging = true
request_id = false

[proxy]
# timeout = "30s"

# Forward everything under /api/ to a backend, appending the request path
[[routes]]
type = "proxy"
pattern = "/api/**"
method = "GET"
target = "http://localhost:3000"
rewrite = false

# Send the old docs URL elsewhere with 303 See Other
[[routes]]
type = "redirect"
pattern = "/docs"
method = "GET"
location = "https://example.com/docs"
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'routekit serve --config {config_path}' to start the server");
    Ok(())
}
