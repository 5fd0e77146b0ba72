use std::fs;

use frankenengine_live_edit::config::LiveEditConfig;
use frankenengine_live_edit::session::LiveEditSession;

fn main() {
    if let Err(error) = run(std::env::args().skip(1).collect()) {
        eprintln!("{error}");
        std::process::exit(2);
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    if args.is_empty() {
        return Err(usage());
    }

    match args[0].as_str() {
        "run" => run_session(&args[1..]),
        "help" | "--help" | "-h" => {
            println!("{}", usage());
            Ok(())
        }
        other => Err(format!("unknown subcommand '{other}'\n\n{}", usage())),
    }
}

fn usage() -> String {
    [
        "live_edit_session usage:",
        "  live_edit_session run --seed <script.js> --requests <requests.jsonl>",
        "      [--config <config.json>] [--events]",
    ]
    .join("\n")
}

fn flag_value<'a>(args: &'a [String], index: usize, flag: &str) -> Result<&'a str, String> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a path"))
}

fn run_session(args: &[String]) -> Result<(), String> {
    let mut seed_path: Option<&str> = None;
    let mut requests_path: Option<&str> = None;
    let mut config_path: Option<&str> = None;
    let mut events = false;

    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "--seed" => {
                index += 1;
                seed_path = Some(flag_value(args, index, "--seed")?);
            }
            "--requests" => {
                index += 1;
                requests_path = Some(flag_value(args, index, "--requests")?);
            }
            "--config" => {
                index += 1;
                config_path = Some(flag_value(args, index, "--config")?);
            }
            "--events" => events = true,
            flag => return Err(format!("unknown flag for run: {flag}")),
        }
        index += 1;
    }

    let seed_path = seed_path.ok_or_else(|| "missing required --seed <path>".to_string())?;
    let requests_path =
        requests_path.ok_or_else(|| "missing required --requests <path>".to_string())?;
    let config = match config_path {
        Some(path) => {
            LiveEditConfig::from_json_str(&read(path)?).map_err(|error| error.to_string())?
        }
        None => LiveEditConfig::default(),
    };

    let mut session =
        LiveEditSession::start(&read(seed_path)?, config).map_err(|error| error.to_string())?;
    for output in session.run_requests(&read(requests_path)?) {
        println!(
            "{}",
            serde_json::to_string(&output)
                .map_err(|error| format!("failed to encode response: {error}"))?
        );
    }

    if events {
        for event in session.drain_events() {
            eprintln!(
                "{}",
                serde_json::to_string(&event)
                    .map_err(|error| format!("failed to encode event: {error}"))?
            );
        }
    }
    Ok(())
}

fn read(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|error| format!("failed to read {path}: {error}"))
}
