use clap::Parser;
use stockfolio::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
