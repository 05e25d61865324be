use ascan::cli::{self, Cli, Commands};
use ascan::config;
use ascan::errors::{ErrorKind, ScanError};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }

    let result = match cli.command {
        Commands::Serve(args) => cli::serve::handle_serve(args).await,
        Commands::Policy(args) => cli::policy::handle_policy(args).await,
        Commands::Validate(args) => handle_validate(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(e: &ScanError) -> i32 {
    match e {
        ScanError::Config(_) | ScanError::Yaml(_) => 2,
        _ => match e.classify().kind {
            ErrorKind::NotFound => 3,
            ErrorKind::Conflict => 4,
            ErrorKind::Persistence => 5,
            ErrorKind::Background => 1,
        },
    }
}

async fn handle_validate(args: cli::commands::ValidateArgs) -> Result<(), ScanError> {
    let path = std::path::PathBuf::from(&args.config);
    let _config = config::parse_config(&path).await?;
    println!("Configuration is valid: {}", args.config);
    Ok(())
}
