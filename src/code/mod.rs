use std::fmt;

// ── Opcodes ──────────────────────────────────────────────────────────
//
// Declaration order is grouped by operand shape:
//   zero operands | one u8 | one u16 | u16 + u8 (closure)
// `Opcode::shape` spells the grouping out per opcode, and the const block
// below refuses to compile if the two ever disagree.

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // no operands
    Null,
    Pop,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Mod,
    Shl,
    Shr,
    True,
    False,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
    Minus,
    Bang,
    ReturnValue,
    Return,
    Index,
    CurrentClosure,
    Exit,

    // one 1-byte operand
    GetLocal,
    SetLocal,
    Call,
    GetBuiltin,
    GetFree,

    // one 2-byte operand
    Constant,
    JumpNotTruthy,
    Jump,
    GetGlobal,
    SetGlobal,
    Array,
    Hash,

    // 2-byte constant index + 1-byte free count
    Closure,
}

/// Operand layout of an instruction, in ascending order of declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Shape {
    None,
    Byte,
    Word,
    WordByte,
}

impl Shape {
    pub const fn widths(self) -> &'static [usize] {
        match self {
            Shape::None => &[],
            Shape::Byte => &[1],
            Shape::Word => &[2],
            Shape::WordByte => &[2, 1],
        }
    }

    /// Total operand bytes following the opcode byte.
    pub const fn operand_bytes(self) -> usize {
        match self {
            Shape::None => 0,
            Shape::Byte => 1,
            Shape::Word => 2,
            Shape::WordByte => 3,
        }
    }
}

impl Opcode {
    pub const ALL: [Opcode; 38] = [
        Opcode::Null,
        Opcode::Pop,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Pow,
        Opcode::Mod,
        Opcode::Shl,
        Opcode::Shr,
        Opcode::True,
        Opcode::False,
        Opcode::Equal,
        Opcode::NotEqual,
        Opcode::GreaterThan,
        Opcode::GreaterEqual,
        Opcode::LessThan,
        Opcode::LessEqual,
        Opcode::Minus,
        Opcode::Bang,
        Opcode::ReturnValue,
        Opcode::Return,
        Opcode::Index,
        Opcode::CurrentClosure,
        Opcode::Exit,
        Opcode::GetLocal,
        Opcode::SetLocal,
        Opcode::Call,
        Opcode::GetBuiltin,
        Opcode::GetFree,
        Opcode::Constant,
        Opcode::JumpNotTruthy,
        Opcode::Jump,
        Opcode::GetGlobal,
        Opcode::SetGlobal,
        Opcode::Array,
        Opcode::Hash,
        Opcode::Closure,
    ];

    pub const fn shape(self) -> Shape {
        match self {
            Opcode::Null
            | Opcode::Pop
            | Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Pow
            | Opcode::Mod
            | Opcode::Shl
            | Opcode::Shr
            | Opcode::True
            | Opcode::False
            | Opcode::Equal
            | Opcode::NotEqual
            | Opcode::GreaterThan
            | Opcode::GreaterEqual
            | Opcode::LessThan
            | Opcode::LessEqual
            | Opcode::Minus
            | Opcode::Bang
            | Opcode::ReturnValue
            | Opcode::Return
            | Opcode::Index
            | Opcode::CurrentClosure
            | Opcode::Exit => Shape::None,
            Opcode::GetLocal
            | Opcode::SetLocal
            | Opcode::Call
            | Opcode::GetBuiltin
            | Opcode::GetFree => Shape::Byte,
            Opcode::Constant
            | Opcode::JumpNotTruthy
            | Opcode::Jump
            | Opcode::GetGlobal
            | Opcode::SetGlobal
            | Opcode::Array
            | Opcode::Hash => Shape::Word,
            Opcode::Closure => Shape::WordByte,
        }
    }

    pub const fn operand_widths(self) -> &'static [usize] {
        self.shape().widths()
    }

    /// Full encoded length of the instruction, opcode byte included.
    pub const fn len(self) -> usize {
        1 + self.shape().operand_bytes()
    }

    pub fn from_byte(byte: u8) -> Option<Opcode> {
        Opcode::ALL.get(byte as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::Null => "OpNull",
            Opcode::Pop => "OpPop",
            Opcode::Add => "OpAdd",
            Opcode::Sub => "OpSub",
            Opcode::Mul => "OpMul",
            Opcode::Div => "OpDiv",
            Opcode::Pow => "OpPow",
            Opcode::Mod => "OpMod",
            Opcode::Shl => "OpShl",
            Opcode::Shr => "OpShr",
            Opcode::True => "OpTrue",
            Opcode::False => "OpFalse",
            Opcode::Equal => "OpEqual",
            Opcode::NotEqual => "OpNotEqual",
            Opcode::GreaterThan => "OpGreaterThan",
            Opcode::GreaterEqual => "OpGreaterEqual",
            Opcode::LessThan => "OpLessThan",
            Opcode::LessEqual => "OpLessEqual",
            Opcode::Minus => "OpMinus",
            Opcode::Bang => "OpBang",
            Opcode::ReturnValue => "OpReturnValue",
            Opcode::Return => "OpReturn",
            Opcode::Index => "OpIndex",
            Opcode::CurrentClosure => "OpCurrentClosure",
            Opcode::Exit => "OpExit",
            Opcode::GetLocal => "OpGetLocal",
            Opcode::SetLocal => "OpSetLocal",
            Opcode::Call => "OpCall",
            Opcode::GetBuiltin => "OpGetBuiltin",
            Opcode::GetFree => "OpGetFree",
            Opcode::Constant => "OpConstant",
            Opcode::JumpNotTruthy => "OpJumpNotTruthy",
            Opcode::Jump => "OpJump",
            Opcode::GetGlobal => "OpGetGlobal",
            Opcode::SetGlobal => "OpSetGlobal",
            Opcode::Array => "OpArray",
            Opcode::Hash => "OpHash",
            Opcode::Closure => "OpClosure",
        }
    }
}

// ALL[i] must be the opcode with byte value i, and shapes must never step
// back to a narrower group.
const _: () = {
    let mut i = 0;
    while i < Opcode::ALL.len() {
        assert!(Opcode::ALL[i] as usize == i, "Opcode::ALL out of declaration order");
        if i > 0 {
            let prev = Opcode::ALL[i - 1].shape() as u8;
            let cur = Opcode::ALL[i].shape() as u8;
            assert!(prev <= cur, "opcodes must be declared grouped by operand shape");
        }
        i += 1;
    }
};

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Encoding ─────────────────────────────────────────────────────────

pub type Instructions = Vec<u8>;

/// Largest value an operand of the given width can carry.
pub const fn max_operand(width: usize) -> usize {
    match width {
        1 => u8::MAX as usize,
        2 => u16::MAX as usize,
        _ => 0,
    }
}

/// Encode one instruction. Operands are packed big-endian into their declared
/// widths; callers range-check them first (see `max_operand`).
pub fn make(op: Opcode, operands: &[usize]) -> Instructions {
    let mut ins = Vec::with_capacity(op.len());
    ins.push(op as u8);
    for (&width, &operand) in op.operand_widths().iter().zip(operands) {
        match width {
            2 => ins.extend_from_slice(&(operand as u16).to_be_bytes()),
            _ => ins.push(operand as u8),
        }
    }
    // missing operands encode as zero
    ins.resize(op.len(), 0);
    ins
}

/// Read a one-byte operand at `offset`.
#[inline]
pub fn read_u8(ins: &[u8], offset: usize) -> Option<u8> {
    ins.get(offset).copied()
}

/// Read a big-endian two-byte operand at `offset`.
#[inline]
pub fn read_u16(ins: &[u8], offset: usize) -> Option<u16> {
    match ins.get(offset..offset + 2) {
        Some(&[hi, lo]) => Some(u16::from_be_bytes([hi, lo])),
        _ => None,
    }
}

/// Decode the operands of the instruction whose opcode sits at `offset - 1`.
pub fn read_operands(op: Opcode, ins: &[u8], offset: usize) -> Option<Vec<usize>> {
    let mut operands = Vec::with_capacity(op.operand_widths().len());
    let mut at = offset;
    for &width in op.operand_widths() {
        let value = match width {
            2 => read_u16(ins, at)? as usize,
            _ => read_u8(ins, at)? as usize,
        };
        operands.push(value);
        at += width;
    }
    Some(operands)
}

/// Render an instruction stream, one instruction per line: `0003 OpConstant 1`.
pub fn disassemble(ins: &[u8]) -> String {
    let mut out = String::new();
    let mut offset = 0;
    while offset < ins.len() {
        let byte = ins[offset];
        let Some(op) = Opcode::from_byte(byte) else {
            out.push_str(&format!("{offset:04} ERROR: unknown opcode {byte}\n"));
            offset += 1;
            continue;
        };
        match read_operands(op, ins, offset + 1) {
            Some(operands) => {
                out.push_str(&format!("{offset:04} {op}"));
                for operand in operands {
                    out.push_str(&format!(" {operand}"));
                }
                out.push('\n');
            }
            None => {
                out.push_str(&format!("{offset:04} ERROR: truncated {op}\n"));
            }
        }
        offset += op.len();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_encodes_big_endian() {
        assert_eq!(make(Opcode::Constant, &[65534]), vec![Opcode::Constant as u8, 255, 254]);
        assert_eq!(make(Opcode::GetLocal, &[255]), vec![Opcode::GetLocal as u8, 255]);
        assert_eq!(make(Opcode::Add, &[]), vec![Opcode::Add as u8]);
        assert_eq!(
            make(Opcode::Closure, &[65534, 255]),
            vec![Opcode::Closure as u8, 255, 254, 255]
        );
    }

    #[test]
    fn make_allocates_exact_length() {
        for op in Opcode::ALL {
            let operands = vec![1; op.operand_widths().len()];
            assert_eq!(make(op, &operands).len(), op.len(), "{op}");
        }
    }

    #[test]
    fn shapes_follow_declaration_groups() {
        assert_eq!(Opcode::Exit.shape(), Shape::None);
        assert_eq!(Opcode::GetLocal.shape(), Shape::Byte);
        assert_eq!(Opcode::GetFree.shape(), Shape::Byte);
        assert_eq!(Opcode::Constant.shape(), Shape::Word);
        assert_eq!(Opcode::Hash.shape(), Shape::Word);
        assert_eq!(Opcode::Closure.shape(), Shape::WordByte);
    }

    #[test]
    fn from_byte_inverts_repr() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_byte(op as u8), Some(op));
        }
        assert_eq!(Opcode::from_byte(Opcode::ALL.len() as u8), None);
        assert_eq!(Opcode::from_byte(255), None);
    }

    #[test]
    fn read_operands_at_offset() {
        let ins = make(Opcode::Closure, &[513, 7]);
        assert_eq!(read_u16(&ins, 1), Some(513));
        assert_eq!(read_u8(&ins, 3), Some(7));
        assert_eq!(read_operands(Opcode::Closure, &ins, 1), Some(vec![513, 7]));
        assert_eq!(read_u16(&ins, 3), None);
    }

    #[test]
    fn disassemble_lists_offsets() {
        let mut ins = make(Opcode::Add, &[]);
        ins.extend(make(Opcode::GetLocal, &[1]));
        ins.extend(make(Opcode::Constant, &[2]));
        ins.extend(make(Opcode::Constant, &[65535]));
        ins.extend(make(Opcode::Closure, &[65535, 255]));
        let expected = "0000 OpAdd\n\
                        0001 OpGetLocal 1\n\
                        0003 OpConstant 2\n\
                        0006 OpConstant 65535\n\
                        0009 OpClosure 65535 255\n";
        assert_eq!(disassemble(&ins), expected);
    }

    #[test]
    fn disassemble_reports_garbage() {
        let out = disassemble(&[200, Opcode::Constant as u8, 1]);
        assert!(out.contains("unknown opcode 200"));
        assert!(out.contains("truncated OpConstant"));
    }
}
