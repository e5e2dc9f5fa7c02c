//! `statsuite` command line runner
//!
//! Reads a JSON object of named tasks, runs it as one batch and prints the
//! results as JSON:
//!
//! ```text
//! statsuite [--config engine.toml] request.json
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use serde_json::{json, Value};
use statsuite::{EngineConfig, Error, Registry, Result, Task};

struct Args {
    config: Option<PathBuf>,
    request: PathBuf,
}

fn parse_args() -> Result<Args> {
    let mut config = None;
    let mut request = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| Error::InvalidInput("--config requires a path".into()))?;
                config = Some(PathBuf::from(path));
            }
            _ if request.is_none() => request = Some(PathBuf::from(arg)),
            _ => return Err(Error::InvalidInput(format!("unexpected argument '{}'", arg))),
        }
    }
    let request = request.ok_or_else(|| {
        Error::InvalidInput("usage: statsuite [--config <file>] <request.json>".into())
    })?;
    Ok(Args { config, request })
}

fn run() -> Result<Value> {
    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::load_default()?,
    };

    let text = std::fs::read_to_string(&args.request)?;
    let tasks: BTreeMap<String, Task> = serde_json::from_str(&text)?;

    let registry = Registry::new(config)?;
    let results = registry.invoke_batch(tasks);

    let report: BTreeMap<String, Value> = results
        .into_iter()
        .map(|(name, result)| {
            let entry = match result {
                Ok(output) => json!({ "ok": output }),
                Err(e) => json!({ "error": e.to_string() }),
            };
            (name, entry)
        })
        .collect();
    registry.terminate_all()?;
    Ok(serde_json::to_value(report)?)
}

fn main() -> ExitCode {
    match run().and_then(|report| Ok(serde_json::to_string_pretty(&report)?)) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("statsuite: {}", e);
            ExitCode::FAILURE
        }
    }
}
