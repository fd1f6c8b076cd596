// File: src/value.rs
//
// Runtime value model: the tagged set of values the VM pushes, pops, and
// stores. Heap-backed variants are reference-counted so the VM can clone a
// stack value cheaply instead of deep-copying arrays/strings/closures on
// every push.

use std::hash::BuildHasher;
use std::rc::Rc;

use crate::bytecode::Instructions;

/// A compiled function body plus the frame shape the VM needs to call it:
/// how many parameter slots to prime and how many local slots to reserve.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A `CompiledFunction` plus the free variables it captured at construction
/// time. Free variables are copied by value — there is no shared, mutable
/// upvalue cell here, unlike a typical closure implementation.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub function: Rc<CompiledFunction>,
    pub free: Vec<Value>,
}

/// Key/value pair stored in a `Hash`, retained alongside the digest so the
/// original key value can be recovered (e.g. for inspection).
#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

/// A hashable value's identity for dict lookups: (type tag, 64-bit digest).
/// Two values that are `==` under this contract must produce the same key,
/// independent of whatever identity rules the `Equal` opcode applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub type_tag: &'static str,
    pub digest: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HashData {
    pub pairs: std::collections::HashMap<HashKey, HashPair>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Null,
    String(Rc<str>),
    Array(Rc<Vec<Value>>),
    Hash(Rc<HashData>),
    CompiledFunction(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    Builtin(u8),
}

impl Value {
    /// The type tag used for error messages and hash keys.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Boolean(_) => "BOOLEAN",
            Value::Null => "NULL",
            Value::String(_) => "STRING",
            Value::Array(_) => "ARRAY",
            Value::Hash(_) => "HASH",
            Value::CompiledFunction(_) => "COMPILED_FUNCTION",
            Value::Closure(_) => "CLOSURE",
            Value::Builtin(_) => "BUILTIN",
        }
    }

    /// Boolean yields its own value; `Null` is false; everything else truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Null => false,
            _ => true,
        }
    }

    /// `(type_tag, 64-bit digest)` for values usable as hash keys. Only
    /// Integer, Boolean, and String are hashable.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Integer(i) => Some(HashKey { type_tag: self.type_name(), digest: *i as u64 }),
            Value::Boolean(b) => {
                Some(HashKey { type_tag: self.type_name(), digest: if *b { 1 } else { 0 } })
            }
            Value::String(s) => {
                Some(HashKey { type_tag: self.type_name(), digest: ahash::RandomState::with_seeds(0, 0, 0, 0).hash_one(s.as_bytes()) })
            }
            _ => None,
        }
    }

    /// Human-readable rendering, used only by external pretty-printing (the
    /// REPL, `puts`). Not part of the VM's own equality or dispatch logic.
    pub fn inspect(&self) -> String {
        match self {
            Value::Integer(i) => i.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Null => "null".to_string(),
            Value::String(s) => s.to_string(),
            Value::Array(items) => {
                let rendered: Vec<String> = items.iter().map(Value::inspect).collect();
                format!("[{}]", rendered.join(", "))
            }
            Value::Hash(data) => {
                let rendered: Vec<String> = data
                    .pairs
                    .values()
                    .map(|pair| format!("{}: {}", pair.key.inspect(), pair.value.inspect()))
                    .collect();
                format!("{{{}}}", rendered.join(", "))
            }
            Value::CompiledFunction(_) => "CompiledFunction[...]".to_string(),
            Value::Closure(_) => "Closure[...]".to_string(),
            Value::Builtin(idx) => format!("builtin#{idx}"),
        }
    }
}
