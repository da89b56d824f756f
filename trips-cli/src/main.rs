//! Entry point for the `trips` binary.
#![forbid(unsafe_code)]

use trips_cli::CliError;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    match trips_cli::run() {
        Ok(()) => {}
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            eprintln!("trips: {err}");
            std::process::exit(1);
        }
    }
}
