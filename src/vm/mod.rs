use std::rc::Rc;

use crate::code::{self, Opcode, Shape};
use crate::compiler::Bytecode;
use crate::object::{BUILTINS, Closure, CompiledFunction, HashObject, HashPair, Object, ObjectKind};

pub const STACK_SIZE: usize = 2048;
pub const GLOBALS_SIZE: usize = 65536;
pub const MAX_FRAMES: usize = 1024;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VmError {
    #[error("stack overflow")]
    StackOverflow,
    #[error("stack underflow")]
    StackUnderflow,
    #[error("call depth exceeded {max} frames")]
    FrameOverflow { max: usize },
    #[error("unknown opcode: {op}")]
    UnknownOpcode { op: u8 },
    #[error("truncated operands for {op}")]
    TruncatedInstruction { op: Opcode },
    #[error("unsupported types for binary operation: {left} {op} {right}")]
    UnsupportedBinary { op: &'static str, left: ObjectKind, right: ObjectKind },
    #[error("unknown operator: {left} {op} {right}")]
    UnsupportedComparison { op: &'static str, left: ObjectKind, right: ObjectKind },
    #[error("unsupported type for negation: {kind}")]
    UnsupportedNegation { kind: ObjectKind },
    #[error("division by zero")]
    DivisionByZero,
    #[error("unusable as hash key: {kind}")]
    UnusableHashKey { kind: ObjectKind },
    #[error("index operator not supported: {left}[{index}]")]
    IndexNotSupported { left: ObjectKind, index: ObjectKind },
    #[error("calling non-function and non-built-in: {kind}")]
    NotCallable { kind: ObjectKind },
    #[error("wrong number of arguments: want={want}, got={got}")]
    WrongArgumentCount { want: usize, got: usize },
    #[error("not a function: constant {index}")]
    NotAFunction { index: usize },
    #[error("no builtin at index {index}")]
    UnknownBuiltin { index: usize },
    #[error("no free variable at index {index}")]
    UnknownFree { index: usize },
    #[error("no constant at index {index}")]
    UnknownConstant { index: usize },
}

impl VmError {
    pub fn code(&self) -> &'static str {
        match self {
            VmError::StackOverflow => "MKY-R001",
            VmError::StackUnderflow => "MKY-R002",
            VmError::FrameOverflow { .. } => "MKY-R003",
            VmError::UnknownOpcode { .. } | VmError::TruncatedInstruction { .. } => "MKY-R004",
            VmError::UnsupportedBinary { .. } => "MKY-R005",
            VmError::UnsupportedComparison { .. } => "MKY-R006",
            VmError::UnsupportedNegation { .. } => "MKY-R007",
            VmError::DivisionByZero => "MKY-R008",
            VmError::UnusableHashKey { .. } => "MKY-R009",
            VmError::IndexNotSupported { .. } => "MKY-R010",
            VmError::NotCallable { .. } => "MKY-R011",
            VmError::WrongArgumentCount { .. } => "MKY-R012",
            VmError::NotAFunction { .. }
            | VmError::UnknownBuiltin { .. }
            | VmError::UnknownFree { .. }
            | VmError::UnknownConstant { .. } => "MKY-R013",
        }
    }
}

type VmResult<T> = Result<T, VmError>;

/// Run a program in a fresh VM and return the last value it popped.
pub fn run(bytecode: Bytecode) -> VmResult<Object> {
    let mut vm = Vm::new(bytecode);
    vm.run()?;
    Ok(vm.last_popped())
}

// ── Frames ───────────────────────────────────────────────────────────

#[derive(Debug)]
struct Frame {
    closure: Rc<Closure>,
    /// Offset of the next opcode to execute.
    ip: usize,
    /// First stack slot of this call's locals; the callee sits just below.
    base_pointer: usize,
}

impl Frame {
    fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Frame { closure, ip: 0, base_pointer }
    }
}

// ── VM ───────────────────────────────────────────────────────────────

pub struct Vm {
    constants: Vec<Object>,
    stack: Vec<Object>,
    /// One past the top of the stack.
    sp: usize,
    globals: Vec<Object>,
    frames: Vec<Frame>,
    halted: bool,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_globals(bytecode, Vec::new())
    }

    /// A VM that starts from globals left behind by an earlier run.
    pub fn with_globals(bytecode: Bytecode, mut globals: Vec<Object>) -> Self {
        globals.resize(GLOBALS_SIZE, Object::Null);
        let main = CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        };
        let main = Rc::new(Closure { func: Rc::new(main), free: Vec::new() });
        let mut frames = Vec::with_capacity(64);
        frames.push(Frame::new(main, 0));
        Vm {
            constants: bytecode.constants,
            stack: vec![Object::Null; STACK_SIZE],
            sp: 0,
            globals,
            frames,
            halted: false,
        }
    }

    /// The value most recently popped off the stack: after a program runs to
    /// completion, the value of its final expression statement.
    pub fn last_popped(&self) -> Object {
        self.stack.get(self.sp).cloned().unwrap_or(Object::Null)
    }

    /// Whether the program stopped at an `exit` instruction.
    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn into_globals(self) -> Vec<Object> {
        self.globals
    }

    // ---- Stack ----

    fn push(&mut self, obj: Object) -> VmResult<()> {
        if self.sp >= STACK_SIZE {
            return Err(VmError::StackOverflow);
        }
        self.stack[self.sp] = obj;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> VmResult<Object> {
        if self.sp == 0 {
            return Err(VmError::StackUnderflow);
        }
        self.sp -= 1;
        Ok(self.stack[self.sp].clone())
    }

    /// Remove the top `n` values and return them bottom first.
    fn pop_n(&mut self, n: usize) -> VmResult<Vec<Object>> {
        let start = self.sp.checked_sub(n).ok_or(VmError::StackUnderflow)?;
        let values = self.stack[start..self.sp].to_vec();
        self.sp = start;
        Ok(values)
    }

    fn frame(&self) -> VmResult<&Frame> {
        self.frames.last().ok_or(VmError::StackUnderflow)
    }

    fn frame_mut(&mut self) -> VmResult<&mut Frame> {
        self.frames.last_mut().ok_or(VmError::StackUnderflow)
    }

    // ---- Dispatch ----

    /// Decode the instruction at the current frame's ip and step past it.
    /// `None` once the frame has run off the end of its instructions.
    fn fetch(&mut self) -> VmResult<Option<(Opcode, usize, usize)>> {
        let Some(frame) = self.frames.last_mut() else {
            return Ok(None);
        };
        let ins = &frame.closure.func.instructions;
        let Some(&byte) = ins.get(frame.ip) else {
            return Ok(None);
        };
        let op = Opcode::from_byte(byte).ok_or(VmError::UnknownOpcode { op: byte })?;
        let at = frame.ip + 1;
        let truncated = VmError::TruncatedInstruction { op };
        let (a, b) = match op.shape() {
            Shape::None => (0, 0),
            Shape::Byte => (code::read_u8(ins, at).ok_or(truncated)? as usize, 0),
            Shape::Word => (code::read_u16(ins, at).ok_or(truncated)? as usize, 0),
            Shape::WordByte => {
                let a = code::read_u16(ins, at).ok_or_else(|| truncated.clone())? as usize;
                let b = code::read_u8(ins, at + 2).ok_or(truncated)? as usize;
                (a, b)
            }
        };
        frame.ip += op.len();
        Ok(Some((op, a, b)))
    }

    pub fn run(&mut self) -> VmResult<()> {
        while let Some((op, a, b)) = self.fetch()? {
            match op {
                Opcode::Constant => {
                    let obj = self.constants.get(a).cloned().ok_or(VmError::UnknownConstant { index: a })?;
                    self.push(obj)?;
                }
                Opcode::Pop => {
                    self.pop()?;
                }
                Opcode::Null => self.push(Object::Null)?,
                Opcode::True => self.push(Object::Boolean(true))?,
                Opcode::False => self.push(Object::Boolean(false))?,

                Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Pow
                | Opcode::Mod
                | Opcode::Shl
                | Opcode::Shr => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    let result = binary(op, &left, &right)?;
                    self.push(result)?;
                }

                Opcode::Equal
                | Opcode::NotEqual
                | Opcode::GreaterThan
                | Opcode::GreaterEqual
                | Opcode::LessThan
                | Opcode::LessEqual => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    let result = compare(op, &left, &right)?;
                    self.push(Object::Boolean(result))?;
                }

                Opcode::Bang => {
                    let operand = self.pop()?;
                    self.push(Object::Boolean(!operand.is_truthy()))?;
                }
                Opcode::Minus => match self.pop()? {
                    Object::Integer(n) => self.push(Object::Integer(n.wrapping_neg()))?,
                    other => return Err(VmError::UnsupportedNegation { kind: other.kind() }),
                },

                Opcode::Jump => self.frame_mut()?.ip = a,
                Opcode::JumpNotTruthy => {
                    if !self.pop()?.is_truthy() {
                        self.frame_mut()?.ip = a;
                    }
                }

                Opcode::SetGlobal => {
                    let value = self.pop()?;
                    self.globals[a] = value;
                }
                Opcode::GetGlobal => {
                    let value = self.globals[a].clone();
                    self.push(value)?;
                }
                Opcode::SetLocal => {
                    let slot = self.frame()?.base_pointer + a;
                    let value = self.pop()?;
                    *self.stack.get_mut(slot).ok_or(VmError::StackOverflow)? = value;
                }
                Opcode::GetLocal => {
                    let slot = self.frame()?.base_pointer + a;
                    let value = self.stack.get(slot).cloned().ok_or(VmError::StackOverflow)?;
                    self.push(value)?;
                }
                Opcode::GetBuiltin => {
                    let builtin = BUILTINS.get(a).ok_or(VmError::UnknownBuiltin { index: a })?;
                    self.push(Object::Builtin(builtin))?;
                }
                Opcode::GetFree => {
                    let value = self.frame()?.closure.free.get(a).cloned();
                    self.push(value.ok_or(VmError::UnknownFree { index: a })?)?;
                }
                Opcode::CurrentClosure => {
                    let closure = Rc::clone(&self.frame()?.closure);
                    self.push(Object::Closure(closure))?;
                }

                Opcode::Array => {
                    let elements = self.pop_n(a)?;
                    self.push(Object::array(elements))?;
                }
                Opcode::Hash => {
                    let hash = build_hash(self.pop_n(a)?)?;
                    self.push(Object::Hash(Rc::new(hash)))?;
                }
                Opcode::Index => {
                    let index = self.pop()?;
                    let left = self.pop()?;
                    self.push(index_into(&left, &index)?)?;
                }

                Opcode::Call => self.call(a)?,
                Opcode::ReturnValue => {
                    let value = self.pop()?;
                    self.return_from_call(value)?;
                }
                Opcode::Return => self.return_from_call(Object::Null)?,
                Opcode::Closure => self.push_closure(a, b)?,

                Opcode::Exit => {
                    self.halted = true;
                    break;
                }
            }
        }
        Ok(())
    }

    fn call(&mut self, argc: usize) -> VmResult<()> {
        let callee_slot = self.sp.checked_sub(argc + 1).ok_or(VmError::StackUnderflow)?;
        match self.stack[callee_slot].clone() {
            Object::Closure(closure) => self.call_closure(closure, argc),
            Object::Builtin(builtin) => {
                let result = (builtin.func)(&self.stack[callee_slot + 1..self.sp]);
                self.sp = callee_slot;
                self.push(result)
            }
            other => Err(VmError::NotCallable { kind: other.kind() }),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, argc: usize) -> VmResult<()> {
        let func = &closure.func;
        if argc != func.num_parameters {
            return Err(VmError::WrongArgumentCount { want: func.num_parameters, got: argc });
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(VmError::FrameOverflow { max: MAX_FRAMES });
        }
        let base_pointer = self.sp - argc;
        let top = base_pointer + func.num_locals;
        if top > STACK_SIZE {
            return Err(VmError::StackOverflow);
        }
        for slot in &mut self.stack[self.sp..top] {
            *slot = Object::Null;
        }
        self.sp = top;
        self.frames.push(Frame::new(closure, base_pointer));
        Ok(())
    }

    fn return_from_call(&mut self, value: Object) -> VmResult<()> {
        let frame = self.frames.pop().ok_or(VmError::StackUnderflow)?;
        // drop the locals and the callee itself
        self.sp = frame.base_pointer.checked_sub(1).ok_or(VmError::StackUnderflow)?;
        self.push(value)
    }

    fn push_closure(&mut self, index: usize, free_count: usize) -> VmResult<()> {
        let func = match self.constants.get(index) {
            Some(Object::CompiledFunction(func)) => Rc::clone(func),
            Some(_) => return Err(VmError::NotAFunction { index }),
            None => return Err(VmError::UnknownConstant { index }),
        };
        let free = self.pop_n(free_count)?;
        self.push(Object::Closure(Rc::new(Closure { func, free })))
    }
}

// ── Operators ────────────────────────────────────────────────────────

fn operator(op: Opcode) -> &'static str {
    match op {
        Opcode::Add => "+",
        Opcode::Sub => "-",
        Opcode::Mul => "*",
        Opcode::Div => "/",
        Opcode::Pow => "^",
        Opcode::Mod => "%",
        Opcode::Shl => "<<",
        Opcode::Shr => ">>",
        Opcode::Equal => "==",
        Opcode::NotEqual => "!=",
        Opcode::GreaterThan => ">",
        Opcode::GreaterEqual => ">=",
        Opcode::LessThan => "<",
        Opcode::LessEqual => "<=",
        other => other.name(),
    }
}

fn binary(op: Opcode, left: &Object, right: &Object) -> VmResult<Object> {
    match (left, right) {
        (Object::Integer(a), Object::Integer(b)) => integer_binary(op, *a, *b).map(Object::Integer),
        (Object::Str(a), Object::Str(b)) if op == Opcode::Add => {
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            Ok(Object::string(joined))
        }
        _ => Err(VmError::UnsupportedBinary {
            op: operator(op),
            left: left.kind(),
            right: right.kind(),
        }),
    }
}

/// Integer arithmetic wraps on overflow; only a zero divisor is an error.
fn integer_binary(op: Opcode, a: i64, b: i64) -> VmResult<i64> {
    let value = match op {
        Opcode::Add => a.wrapping_add(b),
        Opcode::Sub => a.wrapping_sub(b),
        Opcode::Mul => a.wrapping_mul(b),
        Opcode::Div if b == 0 => return Err(VmError::DivisionByZero),
        Opcode::Div => a.wrapping_div(b),
        Opcode::Mod if b == 0 => return Err(VmError::DivisionByZero),
        Opcode::Mod => a.wrapping_rem(b),
        Opcode::Pow => (a as f64).powf(b as f64) as i64,
        Opcode::Shl => a.wrapping_shl(b as u32),
        Opcode::Shr => a.wrapping_shr(b as u32),
        _ => {
            return Err(VmError::UnsupportedBinary {
                op: operator(op),
                left: ObjectKind::Integer,
                right: ObjectKind::Integer,
            });
        }
    };
    Ok(value)
}

fn compare(op: Opcode, left: &Object, right: &Object) -> VmResult<bool> {
    if let (Object::Integer(a), Object::Integer(b)) = (left, right) {
        return Ok(match op {
            Opcode::Equal => a == b,
            Opcode::NotEqual => a != b,
            Opcode::GreaterThan => a > b,
            Opcode::GreaterEqual => a >= b,
            Opcode::LessThan => a < b,
            _ => a <= b,
        });
    }
    match op {
        Opcode::Equal => Ok(left.same_as(right)),
        Opcode::NotEqual => Ok(!left.same_as(right)),
        _ => Err(VmError::UnsupportedComparison {
            op: operator(op),
            left: left.kind(),
            right: right.kind(),
        }),
    }
}

fn build_hash(flat: Vec<Object>) -> VmResult<HashObject> {
    let mut hash = HashObject::new();
    let mut items = flat.into_iter();
    while let (Some(key), Some(value)) = (items.next(), items.next()) {
        let hash_key = key.hash_key().ok_or(VmError::UnusableHashKey { kind: key.kind() })?;
        hash.insert(hash_key, HashPair { key, value });
    }
    Ok(hash)
}

fn index_into(left: &Object, index: &Object) -> VmResult<Object> {
    match (left, index) {
        (Object::Array(elements), Object::Integer(i)) => Ok(usize::try_from(*i)
            .ok()
            .and_then(|i| elements.get(i))
            .cloned()
            .unwrap_or(Object::Null)),
        (Object::Hash(hash), key) => {
            let hash_key = key.hash_key().ok_or(VmError::UnusableHashKey { kind: key.kind() })?;
            Ok(hash.get(&hash_key).map(|pair| pair.value.clone()).unwrap_or(Object::Null))
        }
        _ => Err(VmError::IndexNotSupported { left: left.kind(), index: index.kind() }),
    }
}
