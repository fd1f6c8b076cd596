// File: src/errors.rs
//
// Error taxonomy for the compiler and VM. Unlike a source-level interpreter,
// this core never tracks line/column information (spec: no source-level
// debugging), so these carry only the structured payload needed to explain
// the failure.

use colored::Colorize;
use std::fmt;

/// Errors raised by the compiler, aborting the current compilation.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    UnknownOperator(String),
    UndefinedVariable(String),
    ReturnOutsideFunction,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (kind, message) = match self {
            CompileError::UnknownOperator(op) => ("Compile Error", format!("unknown operator: {op}")),
            CompileError::UndefinedVariable(name) => {
                ("Compile Error", format!("undefined variable: {name}"))
            }
            CompileError::ReturnOutsideFunction => {
                ("Compile Error", "return outside function".to_string())
            }
        };
        write!(f, "{}: {}", kind.red().bold(), message.bold())
    }
}

impl std::error::Error for CompileError {}

/// Errors raised by the VM while executing bytecode, aborting the current
/// call to `run()`.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    StackOverflow,
    UnsupportedBinaryOperands(String, String),
    UnknownIntegerOperator(String),
    UnsupportedNegationOperand(String),
    UnknownComparisonOperator(String),
    IndexOperatorUnsupported(String),
    UnusableHashKey(String),
    WrongArgumentCount { want: usize, got: usize },
    CallingNonFunction,
    NotAFunction(String),
    DivisionByZero,
    GlobalsOverflow,
    FrameOverflow,
    UnsupportedArgument(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let message = match self {
            RuntimeError::StackOverflow => "stack overflow".to_string(),
            RuntimeError::UnsupportedBinaryOperands(t1, t2) => {
                format!("unsupported types for binary operation: {t1} {t2}")
            }
            RuntimeError::UnknownIntegerOperator(op) => format!("unknown integer operator: {op}"),
            RuntimeError::UnsupportedNegationOperand(t) => format!("unsupported type for negation: {t}"),
            RuntimeError::UnknownComparisonOperator(op) => format!("unknown operator: {op}"),
            RuntimeError::IndexOperatorUnsupported(t) => format!("index operator not supported: {t}"),
            RuntimeError::UnusableHashKey(t) => format!("unusable as hash key: {t}"),
            RuntimeError::WrongArgumentCount { want, got } => {
                format!("wrong number of arguments: want={want}, got={got}")
            }
            RuntimeError::CallingNonFunction => "calling non-function".to_string(),
            RuntimeError::NotAFunction(constant) => format!("not a function: {constant}"),
            RuntimeError::DivisionByZero => "division by zero".to_string(),
            RuntimeError::GlobalsOverflow => "too many globals".to_string(),
            RuntimeError::FrameOverflow => "frame stack overflow".to_string(),
            RuntimeError::UnsupportedArgument(message) => message.clone(),
        };
        write!(f, "{}: {}", "Runtime Error".red().bold(), message.bold())
    }
}

impl std::error::Error for RuntimeError {}
