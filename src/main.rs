//! KnightCode compiler CLI

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::debug;

use kcc::{compile_file, CompileOptions, Severity, UndeclaredPolicy};

#[derive(Parser)]
#[command(name = "kcc")]
#[command(about = "Compile a KnightCode program to a runnable JVM class file")]
#[command(version)]
struct Cli {
    /// KnightCode source file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Class file to write; its stem becomes the class name
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Emit a Java 5 class without StackMapTable frames
    #[arg(long)]
    no_frames: bool,

    /// Report undeclared variables and keep going instead of stopping at the first
    #[arg(long)]
    report_undeclared: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let options = CompileOptions {
        generate_stack_map_table: !cli.no_frames,
        undeclared_policy: if cli.report_undeclared {
            UndeclaredPolicy::Report
        } else {
            UndeclaredPolicy::Fatal
        },
        source_file: cli
            .input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
    };
    debug!("compiling {} -> {}", cli.input.display(), cli.output.display());

    match compile_file(&cli.input, &cli.output, &options) {
        Ok(diagnostics) => {
            for diagnostic in &diagnostics {
                eprintln!("{}: {}", cli.input.display(), diagnostic);
            }
            if diagnostics.iter().any(|d| d.severity == Severity::Error) {
                eprintln!("compilation failed; {} not written", cli.output.display());
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(failure) => {
            for diagnostic in &failure.diagnostics {
                eprintln!("{}: {}", cli.input.display(), diagnostic);
            }
            eprintln!("{}: error: {}", cli.input.display(), failure.error);
            ExitCode::FAILURE
        }
    }
}
