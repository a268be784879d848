use std::env;
use std::process;
use std::sync::Arc;

use clap::{Arg, Command};
use slog::error;

pub mod api;
pub mod audio;
pub mod command_handlers;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod utils;

use engine::Fingerprinter;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Expected 'serve', 'enroll', 'identify', 'stats', or 'reset' subcommands");
        process::exit(1);
    }

    let engine = match Fingerprinter::new(utils::db_file()) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            let logger = utils::get_logger();
            error!(logger, "failed to open fingerprint database";
                "error" => e.to_string(), "stack_trace" => utils::error_trace());
            process::exit(1);
        }
    };

    let result = match args[1].as_str() {
        "serve" => {
            let host = args.get(2).map_or("127.0.0.1", |s| s);
            let port = args.get(3).map_or(8080, |s| s.parse().unwrap_or(8080));

            let rt = tokio::runtime::Runtime::new().expect("failed to build tokio runtime");
            rt.block_on(command_handlers::serve(engine, host, port))
        }
        "enroll" => {
            let enroll_cmd = Command::new("enroll")
                .arg(
                    Arg::new("title")
                        .long("title")
                        .default_value("Unknown")
                        .help("Song title"),
                )
                .arg(
                    Arg::new("artist")
                        .long("artist")
                        .default_value("Unknown")
                        .help("Artist name"),
                )
                .arg(
                    Arg::new("path")
                        .required(true)
                        .help("Path to an audio file or a directory of audio files"),
                );
            let matches = enroll_cmd.get_matches_from(&args[1..]);
            let title = matches.get_one::<String>("title").unwrap();
            let artist = matches.get_one::<String>("artist").unwrap();
            let path = matches.get_one::<String>("path").unwrap();
            command_handlers::enroll(&engine, path, title, artist)
        }
        "identify" => {
            if args.len() < 3 {
                println!("Usage: sound-print-rs identify <path_to_audio_file>");
                process::exit(1);
            }
            command_handlers::identify(&engine, &args[2])
        }
        "stats" => command_handlers::stats(&engine),
        "reset" => command_handlers::reset(&engine),
        _ => {
            println!("Expected 'serve', 'enroll', 'identify', 'stats', or 'reset' subcommands");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
