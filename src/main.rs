//! Braid compiler CLI entry point.

mod cli;

use std::process::ExitCode;

use braid::pipeline::{check_with_diagnostics, compile_with_diagnostics, run_with_diagnostics};
use braid::{BraidDatabaseImpl, SourceProgram};
use braid_core::{Diagnostic, DiagnosticSeverity};
use braid_ir::{CompilerIr, VariantTable};
use braid_types::Mode;
use clap::Parser;
use cli::{Cli, Command, Input};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let db = BraidDatabaseImpl::default();
    let (Command::Check(input) | Command::Run(input) | Command::Compile(input)) = &cli.command;
    let Some(source) = load(&db, input) else {
        return ExitCode::FAILURE;
    };

    let diagnostics = match &cli.command {
        Command::Check(_) => {
            let result = check_with_diagnostics(&db, source);
            if let Some(ty) = result.ty {
                println!("{ty}");
            }
            result.diagnostics
        }
        Command::Run(_) => {
            let result = run_with_diagnostics(&db, source);
            if let Some(value) = result.value {
                println!("{value}");
            }
            result.diagnostics
        }
        Command::Compile(_) => {
            let result = compile_with_diagnostics(&db, source);
            if let (Some(ir), Some(variants)) = (&result.ir, &result.variants) {
                print_ir(ir, variants);
            }
            result.diagnostics
        }
    };

    print_diagnostics(&diagnostics);
    let failed = diagnostics
        .iter()
        .any(|diag| diag.severity == DiagnosticSeverity::Error);
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn load(db: &BraidDatabaseImpl, input: &Input) -> Option<SourceProgram> {
    let mode = if input.shader {
        Mode::Shader
    } else {
        Mode::General
    };
    match db.load(&input.file, mode) {
        Ok(source) => Some(source),
        Err(e) => {
            eprintln!("{e}");
            None
        }
    }
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        eprintln!(
            "[{}] {:?} at {}..{}: {}",
            diag.severity, diag.phase, diag.span.start, diag.span.end, diag.message
        );
    }
}

fn print_ir(ir: &CompilerIr, variants: &VariantTable) {
    println!("=== main ===");
    println!("{}", ir.main.body);
    for proc in ir.procs.values() {
        println!("=== proc {} ===", proc.id);
        println!("{}", proc.body);
    }
    for prog in ir.progs.values() {
        print!("=== prog {}", prog.id);
        if let Some(annotation) = &prog.annotation {
            print!(" ({annotation})");
        }
        if let Some(escape) = prog.snippet_escape {
            print!(" fills {escape}");
        }
        println!(" ===");
        println!("{}", prog.body);
        println!(
            "persist: {}, splice: {}, free: {}, bound: {}",
            prog.persist.len(),
            prog.splice.len(),
            prog.free.len(),
            prog.bound.len()
        );
        if let Some(Some(list)) = variants.get(&prog.id) {
            for variant in list {
                let config: Vec<String> = variant.config.iter().map(ToString::to_string).collect();
                println!("variant [{}]:", config.join(", "));
                if let Some(body) = variant.progs.get(&prog.id) {
                    println!("  {}", body.body);
                }
            }
        }
    }
}
