use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ascan", version, about = "Active-scan orchestration: concurrent scans, attack mode and scan policies")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP control API
    Serve(ServeArgs),
    /// Manage stored scan policies
    Policy(PolicyArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Listen address (overrides the config file)
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port (overrides the config file)
    #[arg(long)]
    pub port: Option<u16>,

    /// Delay the built-in engine spends on each node, in milliseconds
    #[arg(long, default_value = "50")]
    pub step_delay_ms: u64,
}

#[derive(Args, Clone)]
pub struct PolicyArgs {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Policy directory (overrides the config file)
    #[arg(long, global = true)]
    pub dir: Option<String>,

    #[command(subcommand)]
    pub action: PolicyAction,
}

#[derive(Subcommand, Clone)]
pub enum PolicyAction {
    /// List stored policies
    List,
    /// Print a policy's categories and scanners
    Show {
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a policy with default settings
    Create { name: String },
    /// Copy a policy file into the store
    Import { file: String },
    /// Write a stored policy to a file
    Export { name: String, file: String },
    /// Delete a stored policy
    Delete { name: String },
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Path to configuration file
    pub config: String,
}
