//! CLI runner for mission scripts.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use astroscript::{Registry, RunStatus, Script};

#[derive(Parser)]
#[command(name = "astrorun")]
#[command(author, version, about = "Parse, validate, and run a mission script", long_about = None)]
struct Args {
    /// Mission script file
    input: PathBuf,

    /// Validate only; report every error without running
    #[arg(long)]
    check: bool,

    /// Print the regenerated script after loading
    #[arg(long)]
    emit_script: bool,
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let script = Script::parse(&text)
        .with_context(|| format!("parsing {}", args.input.display()))?;

    if args.check {
        let mut registry = Registry::new();
        let (seq, errors) = script.validate_all(&mut registry)?;
        if args.emit_script {
            print!("{}", seq.generating_script());
        }
        if errors.is_empty() {
            println!("{}: {} commands, no errors", args.input.display(), seq.len());
            return Ok(());
        }
        eprintln!("{}: {} validation errors", args.input.display(), errors.len());
        for err in &errors {
            eprintln!("  {err}");
        }
        std::process::exit(1);
    }

    if args.emit_script {
        let mut registry = Registry::new();
        let seq = script.build(&mut registry)?;
        print!("{}", seq.generating_script());
    }

    let result = script.run()?;
    match result.status {
        RunStatus::Completed => {
            println!(
                "{} ({} commands executed)",
                result.message, result.commands_executed
            );
        }
        RunStatus::Stopped => {
            println!(
                "{} after {} commands",
                result.message, result.commands_executed
            );
        }
        RunStatus::Halted => {
            eprintln!("run halted: {}", result.message);
            if let Some(cmd) = &result.failed_command {
                eprintln!("  at: {cmd}");
            }
            std::process::exit(1);
        }
    }
    Ok(())
}
