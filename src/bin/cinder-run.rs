//! Fixture runner: execute a JSON file of EVM test vectors and report
//! per-case pass/fail.

use anyhow::Context as _;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cinder-run", about = "Run EVM bytecode test vectors")]
struct Args {
    /// JSON file holding an array of fixtures
    file: PathBuf,

    /// Only run fixtures whose name contains this substring
    #[arg(long)]
    filter: Option<String>,

    /// Log every dispatched opcode (equivalent to RUST_LOG=cinder_evm=trace)
    #[arg(long)]
    trace: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.trace { "cinder_evm=trace" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let fixtures = cinder_evm::fixture::load(&text)
        .with_context(|| format!("parsing {}", args.file.display()))?;

    let mut passed = 0usize;
    let mut failed = 0usize;
    for (i, fixture) in fixtures.iter().enumerate() {
        let name = fixture.name.clone().unwrap_or_else(|| format!("case #{i}"));
        if let Some(filter) = &args.filter {
            if !name.contains(filter.as_str()) {
                continue;
            }
        }
        match fixture.check() {
            Ok(()) => {
                passed += 1;
                println!("PASS  {name}");
            }
            Err(why) => {
                failed += 1;
                println!("FAIL  {name}: {why}");
            }
        }
    }

    println!("{passed} passed, {failed} failed");
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
