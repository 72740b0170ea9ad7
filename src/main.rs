//! Purpose: `mango` CLI entry point: corpus info, config lookup, query counts, frequencies.
//! Role: Binary crate root; parses args, drives the boundary, emits JSON on stdout.
//! Invariants: Commands emit one JSON document on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `to_exit_code`.
//! Invariants: Every corpus/concordance handle opened here is closed before exit.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};

use mango::boundary::Boundary;
use mango::config::Config;
use mango::core::error::{Error, ErrorKind, to_exit_code};
use mango::core::handle::Handle;
use mango::engine::VerticalEngine;
use mango::freqs::freq_items;
use mango::info::corpus_info;
use mango::logging;

const DEFAULT_CRITERIA: &str = "lemma/e 0~0>0";

#[derive(Parser)]
#[command(
    name = "mango",
    version,
    about = "Query Manatee-style corpora from the command line",
    after_help = r#"EXAMPLES
  $ mango info susanne
  $ mango conf susanne ENCODING
  $ mango conc susanne '[word="the"]'
  $ mango freqs susanne '[word="the"]' --crit doc.id

NOTES
  - Bare corpus ids are looked up in --registry-dir, then MANGO_REGISTRY_PATH
  - Set MANGO_LOG (e.g. MANGO_LOG=debug) for diagnostics on stderr"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        help = "JSON config file (registryDirs, logFilter)",
        value_hint = ValueHint::FilePath
    )]
    config: Option<PathBuf>,
    #[arg(
        long = "registry-dir",
        help = "Registry directory for bare corpus ids (repeatable, searched first)",
        value_hint = ValueHint::DirPath
    )]
    registry_dirs: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Show registry, size and data file details of a corpus")]
    Info { corpus: String },
    #[command(about = "Print one registry configuration value")]
    Conf { corpus: String, key: String },
    #[command(about = "Count the matches of a query")]
    Conc { corpus: String, query: String },
    #[command(about = "Frequency distribution of a query's matches")]
    Freqs {
        corpus: String,
        query: String,
        #[arg(long, default_value = DEFAULT_CRITERIA, help = "Frequency criteria")]
        crit: String,
        #[arg(long, default_value_t = 1, help = "Drop items with lower frequency")]
        flimit: i64,
    },
}

fn main() {
    let exit_code = match run() {
        Ok(exit_code) => exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(exit_code);
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `mango --help`."));
            }
        },
    };

    let config = load_config(cli.config.as_deref(), cli.registry_dirs)?;
    logging::init(config.log_filter.as_deref().unwrap_or("info"));
    let boundary = Boundary::new(VerticalEngine, config);

    let value = dispatch(&boundary, cli.command)?;
    emit_json(value);
    Ok(0)
}

fn load_config(path: Option<&Path>, mut registry_dirs: Vec<PathBuf>) -> Result<Config, Error> {
    let base = match path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let mut config = base.with_env(|key| std::env::var(key).ok());
    // flag dirs are searched before file/env dirs
    registry_dirs.append(&mut config.registry_dirs);
    config.registry_dirs = registry_dirs;
    Ok(config)
}

fn dispatch(boundary: &Boundary<VerticalEngine>, command: Command) -> Result<Value, Error> {
    match command {
        Command::Info { corpus } => {
            let info = corpus_info(boundary, &corpus)?;
            serde_json::to_value(info).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode corpus info")
                    .with_source(err)
            })
        }
        Command::Conf { corpus, key } => with_corpus(boundary, &corpus, |handle| {
            let value = boundary.corpus_conf(handle, &key)?;
            Ok(json!({ "corpus": corpus, "key": key, "value": value }))
        }),
        Command::Conc { corpus, query } => with_corpus(boundary, &corpus, |handle| {
            with_concordance(boundary, handle, &query, |conc| {
                let size = boundary.concordance_size(conc)?;
                Ok(json!({ "corpus": corpus, "query": query, "size": size }))
            })
        }),
        Command::Freqs {
            corpus,
            query,
            crit,
            flimit,
        } => with_corpus(boundary, &corpus, |handle| {
            with_concordance(boundary, handle, &query, |conc| {
                let conc_size = boundary.concordance_size(conc)?;
                let corpus_size = boundary.corpus_size(handle)?;
                let items = freq_items(boundary, handle, conc, &crit, flimit)?;
                Ok(json!({
                    "corpus": corpus,
                    "query": query,
                    "crit": crit,
                    "flimit": flimit,
                    "corpusSize": corpus_size,
                    "concSize": conc_size,
                    "items": items,
                }))
            })
        }),
    }
}

fn with_corpus<T>(
    boundary: &Boundary<VerticalEngine>,
    corpus: &str,
    f: impl FnOnce(Handle) -> Result<T, Error>,
) -> Result<T, Error> {
    let handle = boundary.open_corpus(corpus)?;
    let result = f(handle);
    if let Err(err) = boundary.close_corpus(handle) {
        tracing::warn!(?handle, error = %err, "failed to close corpus");
    }
    result
}

fn with_concordance<T>(
    boundary: &Boundary<VerticalEngine>,
    corpus: Handle,
    query: &str,
    f: impl FnOnce(Handle) -> Result<T, Error>,
) -> Result<T, Error> {
    let handle = boundary.create_concordance(corpus, query)?;
    let result = f(handle);
    if let Err(err) = boundary.close_concordance(handle) {
        tracing::warn!(?handle, error = %err, "failed to close concordance");
    }
    result
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Engine => "engine error".to_string(),
        ErrorKind::InvalidHandle => "invalid handle".to_string(),
        ErrorKind::Index => "index out of range".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(path) = err.path() {
        lines.push(format!("path: {}", path.display()));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
