// File: src/repl.rs
//
// Interactive REPL: threads a persistent constant pool, symbol table, and
// globals array across successive compilations, so bindings from earlier
// turns survive later ones (and survive a turn that itself errors).

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::builtins;
use crate::compiler::{Bytecode, Compiler};
use crate::lexer;
use crate::parser::Parser;
use crate::symbol_table::SymbolTable;
use crate::value::Value;
use crate::vm::VM;

const GLOBALS_SIZE: usize = 65536;

pub struct Repl {
    editor: DefaultEditor,
    constants: Vec<Value>,
    symbol_table: Option<SymbolTable>,
    globals: Vec<Value>,
}

impl Repl {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let editor = DefaultEditor::new()?;
        let mut symbol_table = SymbolTable::new();
        for (index, builtin) in builtins::BUILTINS.iter().enumerate() {
            symbol_table.define_builtin(index, builtin.name);
        }
        Ok(Repl {
            editor,
            constants: Vec::new(),
            symbol_table: Some(symbol_table),
            globals: vec![Value::Null; GLOBALS_SIZE],
        })
    }

    fn show_banner(&self) {
        println!("{}", "╔══════════════════════════════════════════════════════╗".bright_cyan());
        println!("{}", "║              Glyph REPL - Interactive Shell           ║".bright_cyan());
        println!("{}", "╚══════════════════════════════════════════════════════╝".bright_cyan());
        println!();
        println!(
            "  {} Type an expression and press enter. {}{} to exit.",
            "Welcome!".bright_green(),
            "Ctrl+D".bright_yellow(),
            "".normal()
        );
        println!();
    }

    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.show_banner();

        loop {
            match self.editor.readline("glyph> ".bright_green().to_string().as_str()) {
                Ok(line) => {
                    let _ = self.editor.add_history_entry(line.as_str());
                    if line.trim().is_empty() {
                        continue;
                    }
                    self.eval_input(&line);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".bright_yellow());
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "Goodbye!".bright_cyan());
                    break;
                }
                Err(err) => {
                    eprintln!("{} {}", "Error:".bright_red(), err);
                    break;
                }
            }
        }

        Ok(())
    }

    fn eval_input(&mut self, input: &str) {
        let tokens = lexer::tokenize(input);
        let program = match Parser::new(tokens).parse_program() {
            Ok(program) => program,
            Err(errors) => {
                for error in errors {
                    println!("{} {}", "Parse Error:".red().bold(), error);
                }
                return;
            }
        };

        let symbol_table = self.symbol_table.take().expect("symbol table always restored after a turn");
        let mut compiler = Compiler::new_with_state(self.constants.clone(), symbol_table);

        if let Err(err) = compiler.compile(&program) {
            println!("{err}");
            self.symbol_table = Some(compiler.into_symbol_table());
            return;
        }

        let bytecode: Bytecode = compiler.bytecode();
        self.constants = compiler.constants().to_vec();
        self.symbol_table = Some(compiler.into_symbol_table());
        let mut vm = VM::new_with_globals(bytecode, std::mem::take(&mut self.globals));

        match vm.run() {
            Ok(()) => {
                let result = vm.last_popped();
                println!("{} {}", "=>".bright_blue(), result.inspect().bright_white());
            }
            Err(err) => {
                println!("{err}");
            }
        }

        self.globals = vm.globals;
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new().expect("Failed to create REPL")
    }
}
