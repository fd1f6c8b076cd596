// File: src/vm.rs
//
// Stack-based virtual machine. Executes the instruction stream a Compiler
// produces against a value stack, a frame stack, and a globals array.

use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::{read_uint16, read_uint8, Instructions, Op};
use crate::builtins;
use crate::compiler::Bytecode;
use crate::errors::RuntimeError;
use crate::value::{Closure, CompiledFunction, HashData, HashKey, HashPair, Value};

const STACK_SIZE: usize = 2048;
const GLOBALS_SIZE: usize = 65536;
const MAX_FRAMES: usize = 1024;

struct Frame {
    closure: Rc<Closure>,
    ip: i64,
    base_pointer: usize,
}

impl Frame {
    fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Frame { closure, ip: -1, base_pointer }
    }

    fn instructions(&self) -> &Instructions {
        &self.closure.function.instructions
    }
}

pub struct VM {
    constants: Vec<Value>,
    stack: Vec<Value>,
    sp: usize,
    pub globals: Vec<Value>,
    frames: Vec<Frame>,
    frames_index: usize,
}

impl VM {
    pub fn new(bytecode: Bytecode) -> Self {
        VM::new_with_globals(bytecode, vec![Value::Null; GLOBALS_SIZE])
    }

    /// Runs against a globals array carried over from a previous execution —
    /// the REPL's incremental-input contract.
    pub fn new_with_globals(bytecode: Bytecode, globals: Vec<Value>) -> Self {
        let main_function =
            CompiledFunction { instructions: bytecode.instructions, num_locals: 0, num_parameters: 0 };
        let main_closure = Rc::new(Closure { function: Rc::new(main_function), free: Vec::new() });
        let main_frame = Frame::new(main_closure, 0);

        let mut frames = Vec::with_capacity(MAX_FRAMES);
        frames.push(main_frame);

        VM {
            constants: bytecode.constants,
            stack: vec![Value::Null; STACK_SIZE],
            sp: 0,
            globals,
            frames,
            frames_index: 1,
        }
    }

    pub fn stack_top(&self) -> Option<&Value> {
        if self.sp == 0 {
            None
        } else {
            Some(&self.stack[self.sp - 1])
        }
    }

    /// The value most recently popped by a top-level `Pop` — valid only
    /// immediately after such a pop, used for REPL inspection.
    pub fn last_popped(&self) -> &Value {
        &self.stack[self.sp]
    }

    fn current_frame(&self) -> &Frame {
        &self.frames[self.frames_index - 1]
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        &mut self.frames[self.frames_index - 1]
    }

    fn push_frame(&mut self, frame: Frame) -> Result<(), RuntimeError> {
        if self.frames_index >= MAX_FRAMES {
            return Err(RuntimeError::FrameOverflow);
        }
        if self.frames_index < self.frames.len() {
            self.frames[self.frames_index] = frame;
        } else {
            self.frames.push(frame);
        }
        self.frames_index += 1;
        Ok(())
    }

    fn pop_frame(&mut self) -> Frame {
        self.frames_index -= 1;
        self.frames.pop().expect("pop_frame: frame stack unexpectedly empty")
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.sp >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Value {
        let value = self.stack[self.sp - 1].clone();
        self.sp -= 1;
        value
    }

    pub fn run(&mut self) -> Result<(), RuntimeError> {
        while self.current_frame().ip + 1 < self.current_frame().instructions().len() as i64 {
            self.current_frame_mut().ip += 1;
            let ip = self.current_frame().ip as usize;
            // Clone the Rc, not the byte vector: the closure stays alive for
            // the rest of this iteration without holding a borrow of `self`,
            // which frees the handlers below to mutate `self` freely.
            let closure = Rc::clone(&self.current_frame().closure);
            let instructions = &closure.function.instructions;
            let op = Op::from_byte(instructions[ip]).expect("run: unknown opcode byte");

            match op {
                Op::Constant => {
                    let const_index = read_uint16(&instructions, ip + 1) as usize;
                    self.current_frame_mut().ip += 2;
                    self.push(self.constants[const_index].clone())?;
                }
                Op::Add | Op::Sub | Op::Mul | Op::Div => self.execute_binary_operation(op)?,
                Op::True => self.push(Value::Boolean(true))?,
                Op::False => self.push(Value::Boolean(false))?,
                Op::Null => self.push(Value::Null)?,
                Op::Equal | Op::NotEqual | Op::GreaterThan => self.execute_comparison(op)?,
                Op::Minus => self.execute_minus()?,
                Op::Bang => self.execute_bang()?,
                Op::Pop => {
                    self.pop();
                }
                Op::Jump => {
                    let target = read_uint16(&instructions, ip + 1) as usize;
                    self.current_frame_mut().ip = target as i64 - 1;
                }
                Op::JumpNotTruthy => {
                    let target = read_uint16(&instructions, ip + 1) as usize;
                    self.current_frame_mut().ip += 2;
                    let condition = self.pop();
                    if !condition.is_truthy() {
                        self.current_frame_mut().ip = target as i64 - 1;
                    }
                }
                Op::SetGlobal => {
                    let index = read_uint16(&instructions, ip + 1) as usize;
                    self.current_frame_mut().ip += 2;
                    if index >= GLOBALS_SIZE {
                        return Err(RuntimeError::GlobalsOverflow);
                    }
                    let value = self.pop();
                    self.globals[index] = value;
                }
                Op::GetGlobal => {
                    let index = read_uint16(&instructions, ip + 1) as usize;
                    self.current_frame_mut().ip += 2;
                    self.push(self.globals[index].clone())?;
                }
                Op::SetLocal => {
                    let local_index = read_uint8(&instructions, ip + 1) as usize;
                    self.current_frame_mut().ip += 1;
                    let base_pointer = self.current_frame().base_pointer;
                    let value = self.pop();
                    self.stack[base_pointer + local_index] = value;
                }
                Op::GetLocal => {
                    let local_index = read_uint8(&instructions, ip + 1) as usize;
                    self.current_frame_mut().ip += 1;
                    let base_pointer = self.current_frame().base_pointer;
                    self.push(self.stack[base_pointer + local_index].clone())?;
                }
                Op::GetBuiltin => {
                    let index = read_uint8(&instructions, ip + 1) as usize;
                    self.current_frame_mut().ip += 1;
                    self.push(Value::Builtin(index as u8))?;
                }
                Op::GetFree => {
                    let free_index = read_uint8(&instructions, ip + 1) as usize;
                    self.current_frame_mut().ip += 1;
                    let value = self.current_frame().closure.free[free_index].clone();
                    self.push(value)?;
                }
                Op::Array => {
                    let count = read_uint16(&instructions, ip + 1) as usize;
                    self.current_frame_mut().ip += 2;
                    let elements = self.stack[self.sp - count..self.sp].to_vec();
                    self.sp -= count;
                    self.push(Value::Array(Rc::new(elements)))?;
                }
                Op::Hash => {
                    let count = read_uint16(&instructions, ip + 1) as usize;
                    self.current_frame_mut().ip += 2;
                    let hash = self.build_hash(self.sp - count, self.sp)?;
                    self.sp -= count;
                    self.push(Value::Hash(Rc::new(hash)))?;
                }
                Op::Index => {
                    let index = self.pop();
                    let left = self.pop();
                    self.execute_index(left, index)?;
                }
                Op::Call => {
                    let argc = read_uint8(&instructions, ip + 1) as usize;
                    self.current_frame_mut().ip += 1;
                    self.execute_call(argc)?;
                }
                Op::ReturnValue => {
                    let return_value = self.pop();
                    let frame = self.pop_frame();
                    self.sp = frame.base_pointer - 1;
                    self.push(return_value)?;
                }
                Op::Return => {
                    let frame = self.pop_frame();
                    self.sp = frame.base_pointer - 1;
                    self.push(Value::Null)?;
                }
                Op::Closure => {
                    let const_index = read_uint16(&instructions, ip + 1) as usize;
                    let num_free = read_uint8(&instructions, ip + 3) as usize;
                    self.current_frame_mut().ip += 3;
                    self.push_closure(const_index, num_free)?;
                }
            }
        }

        Ok(())
    }

    fn execute_binary_operation(&mut self, op: Op) -> Result<(), RuntimeError> {
        let right = self.pop();
        let left = self.pop();

        match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => {
                let result = match op {
                    Op::Add => l.wrapping_add(*r),
                    Op::Sub => l.wrapping_sub(*r),
                    Op::Mul => l.wrapping_mul(*r),
                    Op::Div => {
                        if *r == 0 {
                            return Err(RuntimeError::DivisionByZero);
                        }
                        l.wrapping_div(*r)
                    }
                    other => return Err(RuntimeError::UnknownIntegerOperator(format!("{other:?}"))),
                };
                self.push(Value::Integer(result))
            }
            (Value::String(l), Value::String(r)) => {
                if op != Op::Add {
                    return Err(RuntimeError::UnknownIntegerOperator(format!("{op:?}")));
                }
                let concatenated = format!("{l}{r}");
                self.push(Value::String(Rc::from(concatenated.as_str())))
            }
            _ => Err(RuntimeError::UnsupportedBinaryOperands(left.type_name().to_string(), right.type_name().to_string())),
        }
    }

    fn execute_comparison(&mut self, op: Op) -> Result<(), RuntimeError> {
        let right = self.pop();
        let left = self.pop();

        if let (Value::Integer(l), Value::Integer(r)) = (&left, &right) {
            let result = match op {
                Op::Equal => l == r,
                Op::NotEqual => l != r,
                Op::GreaterThan => l > r,
                _ => unreachable!(),
            };
            return self.push(Value::Boolean(result));
        }

        match op {
            Op::Equal => self.push(Value::Boolean(values_identical(&left, &right))),
            Op::NotEqual => self.push(Value::Boolean(!values_identical(&left, &right))),
            Op::GreaterThan => {
                Err(RuntimeError::UnknownComparisonOperator(format!("{} > {}", left.type_name(), right.type_name())))
            }
            _ => unreachable!(),
        }
    }

    fn execute_minus(&mut self) -> Result<(), RuntimeError> {
        let operand = self.pop();
        match operand {
            Value::Integer(value) => self.push(Value::Integer(value.wrapping_neg())),
            other => Err(RuntimeError::UnsupportedNegationOperand(other.type_name().to_string())),
        }
    }

    fn execute_bang(&mut self) -> Result<(), RuntimeError> {
        let operand = self.pop();
        self.push(Value::Boolean(!operand.is_truthy()))
    }

    fn build_hash(&self, start: usize, end: usize) -> Result<HashData, RuntimeError> {
        let mut pairs = HashMap::new();
        let mut index = start;
        while index < end {
            let key = self.stack[index].clone();
            let value = self.stack[index + 1].clone();
            let hash_key: HashKey =
                key.hash_key().ok_or_else(|| RuntimeError::UnusableHashKey(key.type_name().to_string()))?;
            pairs.insert(hash_key, HashPair { key, value });
            index += 2;
        }
        Ok(HashData { pairs })
    }

    fn execute_index(&mut self, left: Value, index: Value) -> Result<(), RuntimeError> {
        match (&left, &index) {
            (Value::Array(elements), Value::Integer(i)) => {
                let value = if *i >= 0 && (*i as usize) < elements.len() {
                    elements[*i as usize].clone()
                } else {
                    Value::Null
                };
                self.push(value)
            }
            (Value::Hash(data), _) => {
                let value = match index.hash_key() {
                    Some(key) => data.pairs.get(&key).map(|pair| pair.value.clone()).unwrap_or(Value::Null),
                    None => return Err(RuntimeError::UnusableHashKey(index.type_name().to_string())),
                };
                self.push(value)
            }
            _ => Err(RuntimeError::IndexOperatorUnsupported(left.type_name().to_string())),
        }
    }

    fn execute_call(&mut self, argc: usize) -> Result<(), RuntimeError> {
        let callee = self.stack[self.sp - 1 - argc].clone();
        match callee {
            Value::Closure(closure) => self.call_closure(closure, argc),
            Value::Builtin(index) => self.call_builtin(index, argc),
            _ => Err(RuntimeError::CallingNonFunction),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, argc: usize) -> Result<(), RuntimeError> {
        if argc != closure.function.num_parameters {
            return Err(RuntimeError::WrongArgumentCount { want: closure.function.num_parameters, got: argc });
        }
        let num_locals = closure.function.num_locals;
        let base_pointer = self.sp - argc;
        self.push_frame(Frame::new(closure, base_pointer))?;
        self.sp = base_pointer + num_locals;
        Ok(())
    }

    fn call_builtin(&mut self, index: u8, argc: usize) -> Result<(), RuntimeError> {
        let args = self.stack[self.sp - argc..self.sp].to_vec();
        let builtin = builtins::BUILTINS
            .get(index as usize)
            .ok_or_else(|| RuntimeError::NotAFunction(format!("builtin#{index}")))?;
        let result = (builtin.func)(&args)?;
        self.sp -= argc + 1;
        self.push(result)
    }

    fn push_closure(&mut self, const_index: usize, num_free: usize) -> Result<(), RuntimeError> {
        let function = match &self.constants[const_index] {
            Value::CompiledFunction(function) => Rc::clone(function),
            other => return Err(RuntimeError::NotAFunction(other.type_name().to_string())),
        };

        let free = self.stack[self.sp - num_free..self.sp].to_vec();
        self.sp -= num_free;

        self.push(Value::Closure(Rc::new(Closure { function, free })))
    }
}

/// Identity comparison for every non-Integer type: Boolean/Null are cheap
/// canonical payloads (identity collapses to value equality), and every
/// heap variant compares by pointer. No deep-structural `Equal` opcode
/// exists — the hash-key contract in `value.rs` is the only place
/// string/array/hash contents are compared structurally.
fn values_identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Boolean(l), Value::Boolean(r)) => l == r,
        (Value::Null, Value::Null) => true,
        (Value::String(l), Value::String(r)) => Rc::ptr_eq(l, r),
        (Value::Array(l), Value::Array(r)) => Rc::ptr_eq(l, r),
        (Value::Hash(l), Value::Hash(r)) => Rc::ptr_eq(l, r),
        (Value::CompiledFunction(l), Value::CompiledFunction(r)) => Rc::ptr_eq(l, r),
        (Value::Closure(l), Value::Closure(r)) => Rc::ptr_eq(l, r),
        (Value::Builtin(l), Value::Builtin(r)) => l == r,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn run(input: &str) -> Value {
        let tokens = tokenize(input);
        let program = Parser::new(tokens).parse_program().expect("parse error");
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compile error");
        let mut vm = VM::new(compiler.bytecode());
        vm.run().expect("runtime error");
        vm.last_popped().clone()
    }

    #[test]
    fn empty_program_runs_without_panicking() {
        // The main frame starts at ip = -1 with zero instructions; the
        // run loop's guard must not overflow comparing against that before
        // ever dispatching an opcode.
        let tokens = tokenize("");
        let program = Parser::new(tokens).parse_program().expect("parse error");
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compile error");
        let mut vm = VM::new(compiler.bytecode());
        vm.run().expect("runtime error");
    }

    #[test]
    fn adds_integers() {
        assert_eq!(run("1 + 2"), Value::Integer(3));
    }

    #[test]
    fn sequential_statements_leave_last_popped() {
        assert_eq!(run("1; 2"), Value::Integer(2));
    }

    #[test]
    fn if_else_selects_the_right_branch() {
        assert_eq!(run("if (true) { 10 } else { 20 }; 3333"), Value::Integer(3333));
    }

    #[test]
    fn globals_share_values() {
        assert_eq!(run("let one = 1; let two = one; two"), Value::Integer(1));
    }

    #[test]
    fn strings_concatenate() {
        assert_eq!(run(r#""hel" + "lo""#), Value::String(Rc::from("hello")));
    }

    #[test]
    fn array_indexing_returns_null_out_of_bounds() {
        assert_eq!(run("[1, 2, 3][1]"), Value::Integer(2));
        assert_eq!(run("[1, 2, 3][99]"), Value::Null);
    }

    #[test]
    fn closures_call_with_correct_arity() {
        assert_eq!(run("let f = fn(a, b) { a + b }; f(5, 6)"), Value::Integer(11));
    }

    #[test]
    fn wrong_argument_count_is_reported() {
        let tokens = tokenize("let f = fn(a, b) { a + b }; f(1)");
        let program = Parser::new(tokens).parse_program().expect("parse error");
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compile error");
        let mut vm = VM::new(compiler.bytecode());
        let err = vm.run().unwrap_err();
        assert_eq!(err, RuntimeError::WrongArgumentCount { want: 2, got: 1 });
    }

    #[test]
    fn division_by_zero_is_reported() {
        let tokens = tokenize("1 / 0");
        let program = Parser::new(tokens).parse_program().expect("parse error");
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compile error");
        let mut vm = VM::new(compiler.bytecode());
        let err = vm.run().unwrap_err();
        assert_eq!(err, RuntimeError::DivisionByZero);
    }

    #[test]
    fn closures_capture_free_variables_by_value() {
        assert_eq!(
            run(
                "
                let newAdder = fn(a) {
                    fn(b) { a + b }
                };
                let addTwo = newAdder(2);
                addTwo(3);
                "
            ),
            Value::Integer(5)
        );
    }

    #[test]
    fn hash_indexing_round_trips() {
        assert_eq!(run(r#"let h = {"one": 1}; h["one"]"#), Value::Integer(1));
    }
}
