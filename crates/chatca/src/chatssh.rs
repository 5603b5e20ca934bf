//! chatssh - ssh with short-lived certificates from a chatca authority

mod exit_codes;
mod logging;
mod output;
mod wrapper;

use wrapper::ChatsshArgs;

fn main() {
    let args = match ChatsshArgs::parse_from_env(std::env::args()) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };
    let guard = logging::init_tracing("chatssh", if args.verbose { "debug" } else { "warn" });

    let result = wrapper::execute(args);
    drop(guard);

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::error(&format!("{:#}", e));
            std::process::exit(exit_codes::for_error(&e));
        }
    }
}
