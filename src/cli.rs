use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::core::config::loader::ConfigDialect;

#[derive(Parser)]
#[command(
    name = "codeferry",
    about = "Webhook-driven code example replication service",
    long_about = "Watches merged pull requests on a source GitHub repository and copies\nmatched files into target repositories, transformed and renamed per rule,\ndirectly or via pull requests.",
    version,
    after_help = "For detailed command help, run: codeferry <COMMAND> --help"
)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase logging verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,

    #[arg(short = 'V', long, help = "Print version information")]
    pub version: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(
        about = "Run the replication service",
        long_about = "Start the HTTP service.\n\nEndpoints:\n  • POST /webhook   GitHub webhook ingress\n  • GET  /health    liveness and connectivity\n  • GET  /metrics   operational counters and latencies\n\nEvery accepted merged-PR delivery is acknowledged immediately and\nprocessed in a detached background task."
    )]
    Serve(ServeArgs),

    #[command(
        about = "Validate a workflow configuration",
        long_about = "Load and validate the workflow configuration, then print a per-rule\nsummary. Exits non-zero when the configuration does not compile."
    )]
    CheckConfig(CheckConfigArgs),

    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum, help = "Shell type to generate completions for")]
        shell: clap_complete::Shell,
    },

    #[command(about = "Print version information")]
    Version,
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(
        long,
        env = "CODEFERRY_LISTEN",
        default_value = "0.0.0.0:8080",
        help = "Address and port to listen on"
    )]
    pub listen: SocketAddr,

    #[arg(
        long,
        env = "CODEFERRY_CONFIG_FILE",
        default_value = "copier-config.yaml",
        help = "Path to the workflow configuration file"
    )]
    pub config_file: PathBuf,

    #[arg(
        long,
        value_enum,
        env = "CODEFERRY_CONFIG_DIALECT",
        default_value = "workflow",
        help = "Shape of the configuration file"
    )]
    pub config_dialect: ConfigDialect,

    #[arg(
        long,
        env = "CODEFERRY_WEBHOOK_SECRET",
        help = "Shared secret for webhook signature verification (unset disables it)"
    )]
    pub webhook_secret: Option<String>,

    #[arg(
        long,
        env = "CODEFERRY_GITHUB_APP_ID",
        help = "GitHub App id used to mint installation tokens"
    )]
    pub github_app_id: Option<u64>,

    #[arg(
        long,
        env = "CODEFERRY_GITHUB_INSTALLATION_ID",
        help = "Installation id of the app on the source/target repositories"
    )]
    pub github_installation_id: Option<u64>,

    #[arg(
        long,
        env = "CODEFERRY_GITHUB_PRIVATE_KEY",
        help = "Secret name (file path) of the app's PEM-encoded RSA private key"
    )]
    pub github_private_key: Option<String>,

    #[arg(
        long,
        env = "CODEFERRY_GITHUB_TOKEN",
        help = "Fixed GitHub token; overrides the app installation flow",
        conflicts_with = "github_app_id"
    )]
    pub github_token: Option<String>,

    #[arg(
        long,
        env = "CODEFERRY_GITHUB_API_URL",
        default_value = "https://api.github.com",
        help = "GitHub API base URL"
    )]
    pub github_api_url: String,

    #[arg(
        long,
        env = "CODEFERRY_AUDIT_ENABLED",
        help = "Record audit events for every copy, deprecation and error"
    )]
    pub audit_enabled: bool,

    #[arg(
        long,
        env = "CODEFERRY_SLACK_WEBHOOK_URL",
        help = "Chat webhook URL for operational notifications (unset disables them)"
    )]
    pub slack_webhook_url: Option<String>,

    #[arg(
        long,
        env = "CODEFERRY_SLACK_CHANNEL",
        default_value = "#code-examples",
        help = "Chat channel for notifications"
    )]
    pub slack_channel: String,

    #[arg(
        long,
        env = "CODEFERRY_SLACK_USERNAME",
        default_value = "codeferry",
        help = "Username notifications are posted as"
    )]
    pub slack_username: String,

    #[arg(
        long,
        env = "CODEFERRY_SLACK_ICON",
        default_value = ":package:",
        help = "Icon emoji for notifications"
    )]
    pub slack_icon: String,
}

#[derive(Args)]
pub struct CheckConfigArgs {
    #[arg(
        env = "CODEFERRY_CONFIG_FILE",
        default_value = "copier-config.yaml",
        help = "Path to the workflow configuration file"
    )]
    pub config_file: PathBuf,

    #[arg(
        long,
        value_enum,
        env = "CODEFERRY_CONFIG_DIALECT",
        default_value = "workflow",
        help = "Shape of the configuration file"
    )]
    pub config_dialect: ConfigDialect,
}
