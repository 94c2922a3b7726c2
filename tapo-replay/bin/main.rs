//! Replay a recorded segment trace and print the stall diagnosis.
//!
//! Call example:
//!
//! * `tapo-replay --remote 10.0.0.2 --remote-port 52000 -v trace.txt`
use std::{fs, io, process};

use tapo_replay::config::Config;
use tracing_subscriber::filter::LevelFilter;

fn main() {
    let config = Config::from_args();

    let level = match config.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let file = match fs::File::open(&config.trace) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("[-] Couldn't open {}: {}", config.trace.display(), err);
            process::exit(1);
        },
    };

    match tapo_replay::replay(io::BufReader::new(file), config.tuple(), config.analysis()) {
        Ok(report) => println!("{}", report),
        Err(err) => {
            eprintln!("[-] {}: {}", config.trace.display(), err);
            process::exit(1);
        },
    }
}
