use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lion_compiler::error::display_error;
use lion_compiler::pipeline::{render, Stage};

#[derive(Parser)]
#[command(name = "lion")]
#[command(about = "Front end for the lion language")]
struct Cli {
    /// Source file
    file: PathBuf,

    /// How far to take the program
    #[arg(long, value_enum, default_value_t = Stage::default())]
    stage: Stage,

    /// Print the forms without their type annotations
    #[arg(long)]
    plain: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let filename = cli.file.display().to_string();
    let source = match std::fs::read_to_string(&cli.file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Reading {filename} failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(file = %filename, bytes = source.len(), stage = ?cli.stage, "compiling");

    let module = cli.file.file_stem().and_then(|s| s.to_str()).unwrap_or("main");
    match render(&source, module, cli.stage, !cli.plain) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            if display_error(&source, &filename, &e).is_err() {
                eprintln!("{e}");
            }
            ExitCode::FAILURE
        }
    }
}
