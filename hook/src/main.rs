mod cli;
mod commands;
mod error;
mod logging;

use clap::Parser;
use tracing::error;

use ncunit::reconciler::EXIT_FATAL;
use ncunit::{load_config, Layout, UnitConfig};

use cli::{Cli, Command};
use commands::HandleRequest;
use error::HookError;

fn main() {
    let cli = Cli::parse();

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("ncunit-hook: {}", e);
            EXIT_FATAL
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32, HookError> {
    logging::init(cli.log_format)?;

    let layout = Layout::rooted(&cli.root);
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => UnitConfig::default(),
    };
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Command::Handle {
            event,
            role,
            unit,
            ingress_address,
            peer_store,
        } => commands::handle(
            &layout,
            &config,
            HandleRequest {
                event,
                role,
                unit,
                ingress_address,
                peer_store,
            },
            &mut stdout,
        ),
        Command::Status => commands::status(&layout, &mut stdout),
    }
}
