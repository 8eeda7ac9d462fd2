#![deny(unsafe_code)]

//! The Seawolf Video Router broker daemon.

use std::process::ExitCode;

use clap::Parser;
use svr_broker::{Broker, BrokerConfig};
use svr_logging::Verbosity;

#[derive(Debug, Parser)]
#[command(name = "svrd", about = "Seawolf Video Router broker daemon", version)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:18333")]
    bind: String,

    /// Increase logging verbosity (repeatable).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    svr_logging::init(Verbosity::from_occurrences(args.verbose));

    match Broker::bind(&BrokerConfig::new(&args.bind)).and_then(Broker::run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("svrd: {err}");
            ExitCode::FAILURE
        }
    }
}
