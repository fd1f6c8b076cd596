// File: src/builtins.rs
//
// The host-provided built-in registry: an ordered list of (name, callable)
// exposed to the symbol table via `define_builtin` and to the VM by numeric
// index (`GetBuiltin`). Order here IS the index space — do not reorder
// existing entries, only append.

use std::rc::Rc;

use crate::errors::RuntimeError;
use crate::value::Value;

pub type BuiltinFn = fn(&[Value]) -> Result<Value, RuntimeError>;

pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

pub static BUILTINS: &[Builtin] = &[
    Builtin { name: "len", func: builtin_len },
    Builtin { name: "puts", func: builtin_puts },
    Builtin { name: "first", func: builtin_first },
    Builtin { name: "last", func: builtin_last },
    Builtin { name: "rest", func: builtin_rest },
    Builtin { name: "push", func: builtin_push },
];

/// Resolves a built-in name to its index in `BUILTINS`, for
/// `SymbolTable::define_builtin` during compiler setup.
pub fn lookup(name: &str) -> Option<u8> {
    BUILTINS.iter().position(|b| b.name == name).map(|idx| idx as u8)
}

fn wrong_args(want: usize, got: usize) -> RuntimeError {
    RuntimeError::WrongArgumentCount { want, got }
}

fn builtin_len(args: &[Value]) -> Result<Value, RuntimeError> {
    if args.len() != 1 {
        return Err(wrong_args(1, args.len()));
    }
    match &args[0] {
        Value::String(s) => Ok(Value::Integer(s.chars().count() as i64)),
        Value::Array(items) => Ok(Value::Integer(items.len() as i64)),
        other => Err(RuntimeError::UnsupportedArgument(format!(
            "argument to `len` not supported, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_puts(args: &[Value]) -> Result<Value, RuntimeError> {
    for arg in args {
        println!("{}", arg.inspect());
    }
    Ok(Value::Null)
}

fn builtin_first(args: &[Value]) -> Result<Value, RuntimeError> {
    if args.len() != 1 {
        return Err(wrong_args(1, args.len()));
    }
    match &args[0] {
        Value::Array(items) => Ok(items.first().cloned().unwrap_or(Value::Null)),
        other => Err(RuntimeError::UnsupportedArgument(format!(
            "argument to `first` must be ARRAY, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_last(args: &[Value]) -> Result<Value, RuntimeError> {
    if args.len() != 1 {
        return Err(wrong_args(1, args.len()));
    }
    match &args[0] {
        Value::Array(items) => Ok(items.last().cloned().unwrap_or(Value::Null)),
        other => Err(RuntimeError::UnsupportedArgument(format!(
            "argument to `last` must be ARRAY, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_rest(args: &[Value]) -> Result<Value, RuntimeError> {
    if args.len() != 1 {
        return Err(wrong_args(1, args.len()));
    }
    match &args[0] {
        Value::Array(items) => {
            if items.is_empty() {
                Ok(Value::Null)
            } else {
                Ok(Value::Array(Rc::new(items[1..].to_vec())))
            }
        }
        other => Err(RuntimeError::UnsupportedArgument(format!(
            "argument to `rest` must be ARRAY, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_push(args: &[Value]) -> Result<Value, RuntimeError> {
    if args.len() != 2 {
        return Err(wrong_args(2, args.len()));
    }
    match &args[0] {
        Value::Array(items) => {
            let mut new_items = items.as_ref().clone();
            new_items.push(args[1].clone());
            Ok(Value::Array(Rc::new(new_items)))
        }
        other => Err(RuntimeError::UnsupportedArgument(format!(
            "argument to `push` must be ARRAY, got {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_counts_strings_and_arrays() {
        assert_eq!(builtin_len(&[Value::String(Rc::from("hello"))]).unwrap(), Value::Integer(5));
        assert_eq!(
            builtin_len(&[Value::Array(Rc::new(vec![Value::Integer(1), Value::Integer(2)]))]).unwrap(),
            Value::Integer(2)
        );
    }

    #[test]
    fn first_last_rest_on_empty_array_yield_null() {
        let empty = Value::Array(Rc::new(vec![]));
        assert_eq!(builtin_first(&[empty.clone()]).unwrap(), Value::Null);
        assert_eq!(builtin_last(&[empty.clone()]).unwrap(), Value::Null);
        assert_eq!(builtin_rest(&[empty]).unwrap(), Value::Null);
    }

    #[test]
    fn push_returns_a_new_array() {
        let original = Value::Array(Rc::new(vec![Value::Integer(1)]));
        let pushed = builtin_push(&[original.clone(), Value::Integer(2)]).unwrap();
        assert_eq!(pushed, Value::Array(Rc::new(vec![Value::Integer(1), Value::Integer(2)])));
        assert_eq!(original, Value::Array(Rc::new(vec![Value::Integer(1)])));
    }

    #[test]
    fn lookup_resolves_names_to_stable_indices() {
        assert_eq!(lookup("len"), Some(0));
        assert_eq!(lookup("push"), Some(5));
        assert_eq!(lookup("nope"), None);
    }
}
