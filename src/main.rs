use log::{debug, error};

use nftdeck::cli::Cli;
use nftdeck::config::Config;
use nftdeck::logging::init_logging;

fn main() {
    let config = match Config::init() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };

    // Set RUST_LOG to override the configured levels
    let _logger = match init_logging(&config.logging) {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };
    debug!("Command-line args: {:?}", std::env::args_os().collect::<Vec<_>>());

    if let Err(err) = Cli::handle_command_line(config) {
        error!("{:?}", err);
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
