//! metermix entry point — CLI wiring and config-driven pipeline runs.

use std::path::{Path, PathBuf};
use std::process;

use metermix::config::RunConfig;
use metermix::pipeline::Pipeline;

/// Parsed CLI arguments.
struct CliArgs {
    config_path: String,
    layout: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    out_dir: Option<String>,
}

fn print_help() {
    eprintln!("metermix — combine meter exports, day-ahead prices, and PV estimates");
    eprintln!();
    eprintln!("Usage: metermix [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>    Run configuration TOML (default: metermix.toml)");
    eprintln!("  --layout <name>    Override output layout (combined | split)");
    eprintln!("  --start <date>     Override export start date (YYYY-MM-DD)");
    eprintln!("  --end <date>       Override export end date (YYYY-MM-DD)");
    eprintln!("  --out-dir <path>   Override output directory");
    eprintln!("  --help             Show this help message");
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: "metermix.toml".to_string(),
        layout: None,
        start_date: None,
        end_date: None,
        out_dir: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --config requires a path argument");
                    process::exit(1);
                }
                cli.config_path = args[i].clone();
            }
            "--layout" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --layout requires a name argument");
                    process::exit(1);
                }
                cli.layout = Some(args[i].clone());
            }
            "--start" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --start requires a date argument");
                    process::exit(1);
                }
                cli.start_date = Some(args[i].clone());
            }
            "--end" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --end requires a date argument");
                    process::exit(1);
                }
                cli.end_date = Some(args[i].clone());
            }
            "--out-dir" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --out-dir requires a path argument");
                    process::exit(1);
                }
                cli.out_dir = Some(args[i].clone());
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn parse_date_arg(name: &str, value: &str) -> chrono::NaiveDate {
    match value.parse() {
        Ok(date) => date,
        Err(_) => {
            eprintln!("error: {name} value \"{value}\" is not a YYYY-MM-DD date");
            process::exit(1);
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = parse_args();

    let mut config = match RunConfig::from_toml_file(Path::new(&cli.config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    // CLI overrides take precedence over the config file.
    if let Some(layout) = cli.layout {
        config.output.layout = layout;
    }
    if let Some(start) = cli.start_date {
        config.output.start_date = Some(parse_date_arg("--start", &start));
    }
    if let Some(end) = cli.end_date {
        config.output.end_date = Some(parse_date_arg("--end", &end));
    }
    if let Some(dir) = cli.out_dir {
        config.output.directory = PathBuf::from(dir);
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let mut pipeline = Pipeline::new();
    let outcome = match pipeline.run(&config) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    for entry in outcome.report.entries() {
        eprintln!("{entry}");
    }
    println!(
        "{} rows merged, spanning {} to {}",
        outcome.rows.len(),
        outcome.min_date,
        outcome.max_date
    );

    match pipeline.export(&outcome, &config) {
        Ok(path) => println!("workbook written to {}", path.display()),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
