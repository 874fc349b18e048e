use clap::Parser;
use env_logger::Env;
use allocsim::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();
    run(Cli::parse())
}
