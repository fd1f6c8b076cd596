// File: src/compiler.rs
//
// Single-pass compiler: walks the syntax tree once, emitting instructions
// via the encoder in bytecode.rs, consulting the symbol table for name
// resolution, and collecting literals into a constant pool.

use std::rc::Rc;

use crate::ast::{Expr, Program, Stmt};
use crate::builtins;
use crate::bytecode::{change_operand, make, Instructions, Op};
use crate::errors::CompileError;
use crate::symbol_table::{SymbolScope, SymbolTable};
use crate::value::{CompiledFunction, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
struct EmittedInstruction {
    op: Op,
    position: usize,
}

#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

/// The compiled output: the top-level instruction stream plus the constant
/// pool it references.
#[derive(Debug, Clone)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Value>,
}

pub struct Compiler {
    constants: Vec<Value>,
    symbol_table: SymbolTable,
    scopes: Vec<CompilationScope>,
    scope_index: usize,
}

impl Compiler {
    pub fn new() -> Self {
        let mut symbol_table = SymbolTable::new();
        for (index, builtin) in builtins::BUILTINS.iter().enumerate() {
            symbol_table.define_builtin(index, builtin.name);
        }

        Compiler {
            constants: Vec::new(),
            symbol_table,
            scopes: vec![CompilationScope::default()],
            scope_index: 0,
        }
    }

    /// Resumes compilation with a constant pool and symbol table carried
    /// over from a previous compilation — the REPL's incremental-input path.
    pub fn new_with_state(constants: Vec<Value>, symbol_table: SymbolTable) -> Self {
        Compiler { constants, symbol_table, scopes: vec![CompilationScope::default()], scope_index: 0 }
    }

    pub fn compile(&mut self, program: &Program) -> Result<(), CompileError> {
        for stmt in &program.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode { instructions: self.scopes[0].instructions.clone(), constants: self.constants.clone() }
    }

    /// Hands back the symbol table so a driver can carry it into the next
    /// compilation (the REPL's persistent-state contract).
    pub fn into_symbol_table(self) -> SymbolTable {
        self.symbol_table
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    fn compile_statement(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Expr(expr) => {
                self.compile_expression(expr)?;
                self.emit(Op::Pop, &[]);
                Ok(())
            }
            Stmt::Let { name, value } => {
                // A symbol must exist before compiling a recursive reference
                // inside `value`... but this language has no such forward
                // reference, so the spec's literal order (compile, then
                // define, then store) is followed as written.
                self.compile_expression(value)?;
                let symbol = self.symbol_table.define(name);
                let op = match symbol.scope {
                    SymbolScope::Global => Op::SetGlobal,
                    SymbolScope::Local => Op::SetLocal,
                    SymbolScope::Free | SymbolScope::Builtin => {
                        unreachable!("let always defines a Global or Local symbol")
                    }
                };
                self.emit(op, &[symbol.index]);
                Ok(())
            }
            Stmt::Return(value) => {
                if self.scope_index == 0 {
                    return Err(CompileError::ReturnOutsideFunction);
                }
                match value {
                    Some(expr) => self.compile_expression(expr)?,
                    None => {
                        self.emit(Op::Null, &[]);
                    }
                }
                self.emit(Op::ReturnValue, &[]);
                Ok(())
            }
        }
    }

    fn compile_expression(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Integer(value) => {
                let constant = self.add_constant(Value::Integer(*value));
                self.emit(Op::Constant, &[constant]);
            }
            Expr::Boolean(true) => {
                self.emit(Op::True, &[]);
            }
            Expr::Boolean(false) => {
                self.emit(Op::False, &[]);
            }
            Expr::StringLiteral(value) => {
                let constant = self.add_constant(Value::String(Rc::from(value.as_str())));
                self.emit(Op::Constant, &[constant]);
            }
            Expr::Array(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Op::Array, &[elements.len()]);
            }
            Expr::Hash(pairs) => {
                for (key, value) in pairs {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Op::Hash, &[pairs.len() * 2]);
            }
            Expr::Prefix { operator, right } => {
                self.compile_expression(right)?;
                match operator.as_str() {
                    "-" => self.emit(Op::Minus, &[]),
                    "!" => self.emit(Op::Bang, &[]),
                    other => return Err(CompileError::UnknownOperator(other.to_string())),
                };
            }
            Expr::Infix { left, operator, right } => {
                if operator == "<" {
                    self.compile_expression(right)?;
                    self.compile_expression(left)?;
                    self.emit(Op::GreaterThan, &[]);
                    return Ok(());
                }

                self.compile_expression(left)?;
                self.compile_expression(right)?;
                match operator.as_str() {
                    "+" => self.emit(Op::Add, &[]),
                    "-" => self.emit(Op::Sub, &[]),
                    "*" => self.emit(Op::Mul, &[]),
                    "/" => self.emit(Op::Div, &[]),
                    ">" => self.emit(Op::GreaterThan, &[]),
                    "==" => self.emit(Op::Equal, &[]),
                    "!=" => self.emit(Op::NotEqual, &[]),
                    other => return Err(CompileError::UnknownOperator(other.to_string())),
                };
            }
            Expr::If { condition, consequence, alternative } => {
                self.compile_if(condition, consequence, alternative.as_deref())?;
            }
            Expr::Identifier(name) => {
                let symbol = self
                    .symbol_table
                    .resolve(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;
                self.load_symbol(&symbol);
            }
            Expr::Function { parameters, body } => {
                self.compile_function(parameters, body)?;
            }
            Expr::Call { function, arguments } => {
                self.compile_expression(function)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Op::Call, &[arguments.len()]);
            }
            Expr::Index { left, index } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(Op::Index, &[]);
            }
        }
        Ok(())
    }

    fn compile_if(
        &mut self,
        condition: &Expr,
        consequence: &[Stmt],
        alternative: Option<&[Stmt]>,
    ) -> Result<(), CompileError> {
        self.compile_expression(condition)?;
        let jump_not_truthy_pos = self.emit(Op::JumpNotTruthy, &[0]);

        self.compile_block(consequence)?;
        if self.last_instruction_is(Op::Pop) {
            self.remove_last_pop();
        }

        let jump_pos = self.emit(Op::Jump, &[0]);
        let after_consequence = self.current_instructions().len();
        change_operand(self.current_instructions_mut(), jump_not_truthy_pos, after_consequence);

        match alternative {
            None => {
                self.emit(Op::Null, &[]);
            }
            Some(alternative) => {
                self.compile_block(alternative)?;
                if self.last_instruction_is(Op::Pop) {
                    self.remove_last_pop();
                }
            }
        }

        let after_alternative = self.current_instructions().len();
        change_operand(self.current_instructions_mut(), jump_pos, after_alternative);

        Ok(())
    }

    fn compile_block(&mut self, statements: &[Stmt]) -> Result<(), CompileError> {
        for stmt in statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    fn compile_function(&mut self, parameters: &[String], body: &[Stmt]) -> Result<(), CompileError> {
        self.enter_scope();

        for parameter in parameters {
            self.symbol_table.define(parameter);
        }

        self.compile_block(body)?;

        if self.last_instruction_is(Op::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(Op::ReturnValue) {
            self.emit(Op::Return, &[]);
        }

        let free_symbols = self.symbol_table.free_symbols.clone();
        let num_locals = self.symbol_table.num_definitions();
        let instructions = self.leave_scope();

        let num_free = free_symbols.len();
        for symbol in &free_symbols {
            self.load_symbol(symbol);
        }

        let compiled = CompiledFunction { instructions, num_locals, num_parameters: parameters.len() };
        let constant = self.add_constant(Value::CompiledFunction(Rc::new(compiled)));
        self.emit(Op::Closure, &[constant, num_free]);

        Ok(())
    }

    fn load_symbol(&mut self, symbol: &crate::symbol_table::Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Op::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Op::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Op::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Op::GetFree, &[symbol.index]),
        };
    }

    fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    fn add_instruction(&mut self, instruction: Instructions) -> usize {
        let position = self.current_instructions().len();
        self.current_instructions_mut().extend_from_slice(&instruction);
        position
    }

    fn emit(&mut self, op: Op, operands: &[usize]) -> usize {
        let instruction = make(op, operands);
        let position = self.add_instruction(instruction);
        self.set_last_instruction(op, position);
        position
    }

    fn set_last_instruction(&mut self, op: Op, position: usize) {
        let scope = &mut self.scopes[self.scope_index];
        scope.previous_instruction = scope.last_instruction;
        scope.last_instruction = Some(EmittedInstruction { op, position });
    }

    fn last_instruction_is(&self, op: Op) -> bool {
        match self.scopes[self.scope_index].last_instruction {
            Some(emitted) => emitted.op == op,
            None => false,
        }
    }

    fn remove_last_pop(&mut self) {
        let scope = &mut self.scopes[self.scope_index];
        let last = scope.last_instruction.expect("remove_last_pop: nothing emitted");
        scope.instructions.truncate(last.position);
        scope.last_instruction = scope.previous_instruction;
    }

    fn replace_last_pop_with_return(&mut self) {
        let last_position = self.scopes[self.scope_index]
            .last_instruction
            .expect("replace_last_pop_with_return: nothing emitted")
            .position;
        let new_instruction = make(Op::ReturnValue, &[]);
        self.replace_instruction(last_position, &new_instruction);
        self.scopes[self.scope_index].last_instruction =
            Some(EmittedInstruction { op: Op::ReturnValue, position: last_position });
    }

    fn replace_instruction(&mut self, position: usize, new_instruction: &[u8]) {
        let instructions = self.current_instructions_mut();
        instructions[position..position + new_instruction.len()].copy_from_slice(new_instruction);
    }

    fn current_instructions(&self) -> &Instructions {
        &self.scopes[self.scope_index].instructions
    }

    fn current_instructions_mut(&mut self) -> &mut Instructions {
        &mut self.scopes[self.scope_index].instructions
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        self.scope_index += 1;
        let outer = std::mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::new_enclosed(outer);
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = self.scopes.pop().expect("leave_scope: no scope to leave");
        self.scope_index -= 1;
        let outer = std::mem::take(&mut self.symbol_table)
            .into_outer()
            .expect("leave_scope: symbol table has no outer frame");
        self.symbol_table = outer;
        scope.instructions
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}
