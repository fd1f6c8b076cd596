// File: src/main.rs
//
// Entry point for Glyph: compiles and runs a source file, or launches the
// interactive REPL.

mod ast;
mod builtins;
mod bytecode;
mod compiler;
mod errors;
mod lexer;
mod parser;
mod repl;
mod symbol_table;
mod value;
mod vm;

use clap::{Parser as ClapParser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;

use compiler::Compiler;
use parser::Parser;
use vm::VM;

#[derive(ClapParser)]
#[command(
    name = "glyph",
    about = "Glyph: a bytecode compiler and stack VM for a small scripting language",
    version = env!("CARGO_PKG_VERSION"),
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[command(arg_required_else_help = true)]
enum Commands {
    /// Compile and run a .glyph script file
    Run {
        /// Path to the source file
        file: PathBuf,
    },

    /// Launch the interactive REPL
    Repl,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { file } => run_file(&file),
        Commands::Repl => match repl::Repl::new() {
            Ok(mut repl) => {
                if let Err(err) = repl.run() {
                    eprintln!("{} {}", "REPL error:".red().bold(), err);
                    std::process::exit(1);
                }
            }
            Err(err) => {
                eprintln!("{} {}", "Failed to start REPL:".red().bold(), err);
                std::process::exit(1);
            }
        },
    }
}

fn run_file(path: &PathBuf) {
    let source = fs::read_to_string(path).unwrap_or_else(|err| {
        eprintln!("{} could not read {}: {}", "Error:".red().bold(), path.display(), err);
        std::process::exit(1);
    });

    let tokens = lexer::tokenize(&source);
    let program = match Parser::new(tokens).parse_program() {
        Ok(program) => program,
        Err(errors) => {
            for error in errors {
                eprintln!("{} {}", "Parse Error:".red().bold(), error);
            }
            std::process::exit(1);
        }
    };

    let mut compiler = Compiler::new();
    if let Err(err) = compiler.compile(&program) {
        eprintln!("{err}");
        std::process::exit(1);
    }

    let mut vm = VM::new(compiler.bytecode());
    if let Err(err) = vm.run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
