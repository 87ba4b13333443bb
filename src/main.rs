use clap::Parser;
use qweb::cli::{Cli, run};
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();
    match run(Cli::parse()) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}
