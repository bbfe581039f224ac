//! Command-line interface for the Braid compiler.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "braid")]
#[command(about = "Braid multi-stage language compiler", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Type-check a program and print its type
    Check(Input),
    /// Interpret a program and print its value
    Run(Input),
    /// Split a program into fragments and list their variants
    Compile(Input),
}

#[derive(Args)]
pub struct Input {
    /// JSON syntax tree to read
    pub file: PathBuf,
    /// Check against the shader builtin tables
    #[arg(long)]
    pub shader: bool,
}
