//! chatca - SSH certificate authority served over team chat

mod cli;
mod exit_codes;
mod logging;
mod output;

use clap::Parser;

use cli::Cli;

fn main() {
    let cli = Cli::parse();
    let guard = logging::init_tracing("chatca", if cli.verbose { "debug" } else { "warn" });

    let result = cli.execute();
    drop(guard);

    if let Err(e) = result {
        output::error(&format!("{:#}", e));
        std::process::exit(exit_codes::for_error(&e));
    }
}
