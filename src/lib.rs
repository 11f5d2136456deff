pub mod cli;
pub mod error;

pub mod cmd {
    pub mod check_config;
    pub mod completions;
    pub mod serve;
}

pub mod core {
    pub mod audit;
    pub mod config;
    pub mod executor;
    pub mod github;
    pub mod metrics;
    pub mod notify;
    pub mod processor;
    pub mod rules;
    pub mod server;
    pub mod staging;
}

use anyhow::Result;
use cli::{Cli, Commands};

pub async fn execute(cli: Cli) -> Result<()> {
    let command = cli.command.expect("Command must be present");
    match command {
        Commands::Serve(args) => cmd::serve::run(args).await,
        Commands::CheckConfig(args) => {
            let exit_code = cmd::check_config::run(&args)?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
            Ok(())
        }
        Commands::Completions { shell } => {
            cmd::completions::generate(shell);
            Ok(())
        }
        Commands::Version => {
            cmd::completions::print_version();
            Ok(())
        }
    }
}
