//! Scan example: inventory one or more hosts and print the result as JSON
//!
//! Credentials, transports and the rest of the options come from a TOML
//! file. A minimal one:
//!
//! ```toml
//! default_kinds = ["ssh"]
//! scrub = true
//!
//! [[credentials]]
//! user = "admin"
//! secret = "secret"
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --example scan -- --config scan.toml web01 web02
//! ```
//!
//! Force a profiler instead of detecting one:
//! ```bash
//! cargo run --example scan -- --config scan.toml --profiler linux web01
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use hostprobe::{ScanConfig, TargetBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.hosts.is_empty() {
        eprintln!("Error: no hosts given");
        std::process::exit(1);
    }

    let config = match &args.config {
        Some(path) => ScanConfig::from_file(path)?,
        None => ScanConfig::default(),
    };
    let config = Arc::new(config);

    for host in &args.hosts {
        let mut target = TargetBuilder::new(host).config(Arc::clone(&config)).build()?;

        let result = match &args.profiler {
            Some(name) => forced_scan(&mut target, name).await,
            None => target.scan().await.map(|_| ()),
        };

        match result {
            Ok(()) => {
                if let Some(inventory) = target.inventory() {
                    println!("{}", serde_json::to_string_pretty(&inventory.to_json())?);
                }
            }
            Err(e) => {
                eprintln!("{host}: {e}");
                for attempt in target.attempts() {
                    match &attempt.outcome {
                        Ok(()) => eprintln!("  {} over {}: connected", attempt.user, attempt.kind),
                        Err(failure) => eprintln!("  {} over {}: {}", attempt.user, attempt.kind, failure),
                    }
                }
            }
        }
    }

    Ok(())
}

async fn forced_scan(target: &mut hostprobe::Target, profiler: &str) -> Result<(), hostprobe::Error> {
    if !target.connect().await? {
        return Err(hostprobe::error::ConnectionError::Exhausted {
            host: target.host().to_string(),
            attempts: target.attempts().len(),
        }
        .into());
    }
    if let Err(e) = target.force_profiler(profiler) {
        target.disconnect().await;
        return Err(e);
    }
    // Already connected and bound, so this only collects
    target.scan().await.map(|_| ())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    config: Option<PathBuf>,
    profiler: Option<String>,
    hosts: Vec<String>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut config = None;
        let mut profiler = None;
        let mut hosts = Vec::new();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        config = Some(PathBuf::from(&args[i]));
                    }
                }
                "--profiler" | "-p" => {
                    i += 1;
                    if i < args.len() {
                        profiler = Some(args[i].clone());
                    }
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                arg if arg.starts_with('-') => {
                    eprintln!("Unknown argument: {}", arg);
                }
                host => hosts.push(host.to_string()),
            }
            i += 1;
        }

        Self {
            config,
            profiler,
            hosts,
        }
    }

    fn print_help() {
        println!(
            r#"hostprobe scan example

USAGE:
    cargo run --example scan -- [OPTIONS] <HOST>...

OPTIONS:
    -c, --config <PATH>      TOML scan options
    -p, --profiler <NAME>    Skip detection and use this profiler
    --help                   Print this help message

EXAMPLES:
    # Detect and collect
    cargo run --example scan -- --config scan.toml 192.168.1.10

    # Verbose logging
    RUST_LOG=debug cargo run --example scan -- --config scan.toml web01
"#
        );
    }
}
