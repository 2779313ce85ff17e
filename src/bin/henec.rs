//! `henec`: compile one Hene component module from the command line.

use std::{fs, process, str::FromStr};

use clap::Parser;
use log::{debug, error, info, LevelFilter};

use hene_compiler::{
    compile_or_passthrough, compile_with_options, CompileError, CompileOptions, LogSink, RUNTIME_JS,
};

/// Compile HeneElement components into plain custom elements
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input module
    #[arg(help = "Path to the input file")]
    input: String,

    /// Path to write the compiled module; stdout when omitted
    #[arg(short, long)]
    output: Option<String>,

    /// Path to compile options (JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Also write the reactive runtime module to this path
    #[arg(long)]
    emit_runtime: Option<String>,

    /// On a compile error, log it and emit the source unchanged
    #[arg(long)]
    passthrough: bool,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: String, source: std::io::Error },
    #[error("invalid options in {path}: {source}")]
    Options { path: String, source: serde_json::Error },
    #[error(transparent)]
    Compile(#[from] CompileError),
}

fn read(path: &str) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_string(),
        source,
    })
}

fn write(path: &str, contents: &str) -> Result<(), CliError> {
    fs::write(path, contents).map_err(|source| CliError::Write {
        path: path.to_string(),
        source,
    })
}

fn load_options(args: &Args) -> Result<CompileOptions, CliError> {
    let options = match &args.config {
        Some(path) => CompileOptions::from_json(&read(path)?).map_err(|source| CliError::Options {
            path: path.clone(),
            source,
        })?,
        None => CompileOptions::default(),
    };
    Ok(options.with_file_id(args.input.clone()))
}

fn run(args: &Args) -> Result<(), CliError> {
    let options = load_options(args)?;
    debug!(options:?; "Loaded options");
    let source = read(&args.input)?;

    let code = if args.passthrough {
        compile_or_passthrough(&source, &options, &mut LogSink)
    } else {
        compile_with_options(&source, &options)?
    };

    match &args.output {
        Some(path) => {
            write(path, &code)?;
            info!(path:%; "Wrote compiled module");
        }
        None => print!("{}", code),
    }

    if let Some(path) = &args.emit_runtime {
        write(path, RUNTIME_JS)?;
        info!(path:%; "Wrote runtime");
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    let log_level = LevelFilter::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {}. Using 'warn' instead.", args.log_level);
        LevelFilter::Warn
    });
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();

    debug!(args:?; "Parsed arguments");

    if let Err(err) = run(&args) {
        match &err {
            CliError::Compile(error) => {
                debug!(code = error.code.id(); "Compilation failed");
                let reporter = miette::GraphicalReportHandler::new();
                let mut writer = String::new();
                match reporter.render_report(&mut writer, error) {
                    Ok(()) => error!("{writer}"),
                    Err(_) => error!("{err}"),
                }
            }
            _ => error!("{err}"),
        }
        process::exit(1);
    }
}
