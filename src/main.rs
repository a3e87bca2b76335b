use fourbar::{Config, Songbook};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

const USAGE: &str = "Usage: fourbar [--config <fourbar.yaml>] [<directory>] [output.ly]";

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let mut config_path: Option<&String> = None;
    let mut positional: Vec<&String> = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => match iter.next() {
                Some(path) => config_path = Some(path),
                None => {
                    eprintln!("{}", USAGE);
                    process::exit(1);
                }
            },
            "-h" | "--help" => {
                println!("{}", USAGE);
                return;
            }
            _ => positional.push(arg),
        }
    }

    let mut config = match config_path {
        Some(path) => match Config::load(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error reading config '{}': {}", path, e);
                process::exit(1);
            }
        },
        None => Config::default(),
    };

    if let Some(dir) = positional.first() {
        config.directory = Some(PathBuf::from(dir.as_str()));
    }
    if config.directory.is_none() || positional.len() > 2 {
        eprintln!("{}", USAGE);
        process::exit(1);
    }
    let output_path = positional.get(1);

    let songbook = match Songbook::from_config(config) {
        Ok(songbook) => songbook,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    for failure in &songbook.failures {
        eprintln!("Error processing {}: {}", failure.path.display(), failure.error);
    }

    let ly = songbook.render();
    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(path, &ly) {
                eprintln!("Error writing to '{}': {}", path, e);
                process::exit(1);
            }
            eprintln!("Wrote {} excerpts to {}", songbook.excerpts.len(), path);
        }
        None => {
            print!("{}", ly);
        }
    }
}
