//! recruit-session -- probe for the recruitment platform session client.
//!
//! Loads configuration, starts a session (resuming a previous one when the
//! backend allows it) and runs one command against it.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use recruit_session::config::Config;
use recruit_session::{ApiClient, LoginRequest, SessionEvent, SessionManager};

// ---------------------------------------------------------------------------
// CLI argument parsing (minimal, no clap dependency)
// ---------------------------------------------------------------------------

enum Command {
    Status,
    Whoami,
    Login { email: String },
    Logout,
    Watch,
}

struct CliArgs {
    config_path: PathBuf,
    command: Command,
}

fn parse_args() -> CliArgs {
    let mut args = std::env::args().skip(1);
    let mut config_path = PathBuf::from("recruit-session.toml");
    let mut command = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                if let Some(path) = args.next() {
                    config_path = PathBuf::from(path);
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("recruit-session {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "status" if command.is_none() => command = Some(Command::Status),
            "whoami" if command.is_none() => command = Some(Command::Whoami),
            "logout" if command.is_none() => command = Some(Command::Logout),
            "watch" if command.is_none() => command = Some(Command::Watch),
            "login" if command.is_none() => {
                let Some(email) = args.next() else {
                    eprintln!("Error: login requires an email argument");
                    std::process::exit(1);
                };
                command = Some(Command::Login { email });
            }
            other => {
                eprintln!("Unknown argument: {other}");
                eprintln!("Run with --help for usage information.");
                std::process::exit(1);
            }
        }
    }

    CliArgs {
        config_path,
        command: command.unwrap_or(Command::Status),
    }
}

fn print_usage() {
    println!(
        "\
recruit-session {version} -- session client probe

USAGE:
    recruit-session [OPTIONS] [COMMAND]

COMMANDS:
    status                 Resume the session and report it [default]
    whoami                 Fetch the signed-in user
    login <EMAIL>          Sign in (password read from RECRUIT_PASSWORD)
    logout                 Sign out and clear the session
    watch                  Keep the session alive until Ctrl+C or it ends

OPTIONS:
    -c, --config <PATH>    Path to configuration file [default: recruit-session.toml]
    -h, --help             Print this help message
    -V, --version          Print version information

ENVIRONMENT:
    RUST_LOG               Override log level (e.g. RUST_LOG=debug)
    RECRUIT_CONFIG         Alternative to --config flag
    RECRUIT_PASSWORD       Password used by `login`
",
        version = env!("CARGO_PKG_VERSION")
    );
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    let cli = parse_args();

    let config_path = std::env::var("RECRUIT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or(cli.config_path);

    let config = Config::load(&config_path)?;
    init_tracing(&config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        base_url = %config.api.base_url,
        "Starting recruit-session"
    );

    let session = Arc::new(SessionManager::from_config(config));
    let _ended = session.events().subscribe(|event| match event {
        SessionEvent::SessionEnded { reason } => {
            tracing::debug!(%reason, "Session ended");
            eprintln!("{}", recruit_session::SESSION_EXPIRED_MESSAGE);
        }
    });

    let resumed = session.init().await;
    let api = ApiClient::new(Arc::clone(&session));

    let result = run_command(cli.command, &session, &api, resumed.is_some()).await;
    session.dispose();
    result
}

async fn run_command(
    command: Command,
    session: &Arc<SessionManager>,
    api: &ApiClient,
    resumed: bool,
) -> anyhow::Result<()> {
    match command {
        Command::Status => {
            match session.current_credential() {
                Some(credential) => {
                    let expires = credential
                        .expires_at()
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "unknown".to_string());
                    println!(
                        "signed in: subject={} role={} expires={} resumed={resumed}",
                        credential.subject(),
                        credential.role(),
                        expires
                    );
                }
                None => println!("not signed in"),
            }
            Ok(())
        }
        Command::Whoami => match api.current_user().await {
            Ok(user) => {
                println!("{}", serde_json::to_string_pretty(&user)?);
                Ok(())
            }
            Err(e) => {
                eprintln!("{}", e.user_message());
                Err(e.into())
            }
        },
        Command::Login { email } => {
            let password = std::env::var("RECRUIT_PASSWORD")
                .map_err(|_| anyhow::anyhow!("RECRUIT_PASSWORD must be set for login"))?;
            let credential = session.login(LoginRequest::new(email, password)).await?;
            println!(
                "signed in: subject={} role={}",
                credential.subject(),
                credential.role()
            );
            Ok(())
        }
        Command::Logout => {
            session.logout().await;
            println!("signed out");
            Ok(())
        }
        Command::Watch => {
            let mut ended = session.events().subscribe_channel();
            tokio::select! {
                _ = shutdown_signal() => {
                    tracing::info!("Shutdown signal received");
                }
                Some(SessionEvent::SessionEnded { reason }) = ended.recv() => {
                    tracing::warn!(%reason, "Session ended while watching");
                }
            }
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) {
    // RUST_LOG env var takes precedence over config file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.logging.level;
        EnvFilter::new(format!("recruit_session={level},warn"))
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

// ---------------------------------------------------------------------------
// Graceful shutdown
// ---------------------------------------------------------------------------

/// Wait for SIGTERM or SIGINT / Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
