/// An entry in the error code registry.
pub struct ErrorEntry {
    pub code: &'static str,
    pub short: &'static str,
    pub long: &'static str, // full explanation for --explain
}

/// All stable error codes reported by the toolchain.
pub static REGISTRY: &[ErrorEntry] = &[
    // ── Parse ────────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "MKY-P001",
        short: "unexpected token",
        long: r#"## MKY-P001: unexpected token

The parser needed a specific token next and found something else.

**Example:**

    let = 5;

`let` must be followed by the name being bound:

    let five = 5;
"#,
    },
    ErrorEntry {
        code: "MKY-P002",
        short: "token cannot start an expression",
        long: r#"## MKY-P002: token cannot start an expression

An expression was expected, but the token found there cannot begin one
(for example a `;`, `)` or an infix-only operator like `*`).

**Example:**

    let y = ;

Give the binding a value:

    let y = 1;
"#,
    },
    ErrorEntry {
        code: "MKY-P003",
        short: "integer literal out of range",
        long: r#"## MKY-P003: integer literal out of range

Integers are signed 64-bit values. A literal larger than
9223372036854775807 cannot be represented.
"#,
    },
    ErrorEntry {
        code: "MKY-P004",
        short: "illegal character",
        long: r#"## MKY-P004: illegal character

A character was found that is not part of the language.

**Example:**

    let price = 5 @ 2;

`@` is not an operator. Remove it or replace it with one that exists.
"#,
    },
    ErrorEntry {
        code: "MKY-P005",
        short: "unterminated string literal",
        long: r#"## MKY-P005: unterminated string literal

A string was opened with `"` but never closed; the literal runs to the
end of the input. Strings have no escape sequences, so a string cannot
contain a `"` character.
"#,
    },
    // ── Compile ──────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "MKY-C001",
        short: "undefined variable",
        long: r#"## MKY-C001: undefined variable

A name was used that is not bound in any enclosing scope and is not a
builtin.

**Example:**

    let a = 1;
    a + b;

Bind the name with `let` before it is used.
"#,
    },
    ErrorEntry {
        code: "MKY-C002",
        short: "return outside a function",
        long: r#"## MKY-C002: return outside a function

`return` is only meaningful inside a function literal. At the top level
a program's value is its last expression statement; use `exit;` to stop
a program early.
"#,
    },
    ErrorEntry {
        code: "MKY-C003",
        short: "operand too large",
        long: r#"## MKY-C003: operand too large

An instruction operand exceeded the width it is encoded in: more than
65535 constants or globals, more than 255 locals or call arguments, or
a jump past 65535 bytes of code.
"#,
    },
    // ── Runtime ──────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "MKY-R001",
        short: "stack overflow",
        long: r#"## MKY-R001: stack overflow

The operand stack holds 2048 values. Deep recursion with many
arguments or locals per call exhausts it.
"#,
    },
    ErrorEntry {
        code: "MKY-R002",
        short: "stack underflow",
        long: r#"## MKY-R002: stack underflow

An instruction tried to pop from an empty stack. This indicates a
compiler bug, not a user error.
"#,
    },
    ErrorEntry {
        code: "MKY-R003",
        short: "call depth exceeded",
        long: r#"## MKY-R003: call depth exceeded

At most 1024 calls may be active at once. A recursive function that
never reaches its base case fails with this error.

**Example:**

    let f = fn() { f() };
    f();
"#,
    },
    ErrorEntry {
        code: "MKY-R004",
        short: "malformed bytecode",
        long: r#"## MKY-R004: malformed bytecode

The VM met a byte that is not an opcode, or an instruction whose
operands run past the end of the code. This indicates a compiler bug.
"#,
    },
    ErrorEntry {
        code: "MKY-R005",
        short: "unsupported operand types",
        long: r#"## MKY-R005: unsupported operand types

Arithmetic operators work on two integers. `+` additionally joins two
strings. Any other combination fails.

**Example:**

    1 + true;
"#,
    },
    ErrorEntry {
        code: "MKY-R006",
        short: "unsupported comparison",
        long: r#"## MKY-R006: unsupported comparison

`<`, `<=`, `>` and `>=` compare integers only. `==` and `!=` accept any
two values.
"#,
    },
    ErrorEntry {
        code: "MKY-R007",
        short: "unsupported negation",
        long: r#"## MKY-R007: unsupported negation

Prefix `-` applies to integers only. Use `!` for logical negation.
"#,
    },
    ErrorEntry {
        code: "MKY-R008",
        short: "division by zero",
        long: r#"## MKY-R008: division by zero

The right-hand side of `/` or `%` evaluated to zero.
"#,
    },
    ErrorEntry {
        code: "MKY-R009",
        short: "unusable hash key",
        long: r#"## MKY-R009: unusable hash key

Only integers, booleans and strings can be hash keys, both when
building a hash literal and when indexing into one.

**Example:**

    {[1, 2]: "pair"};
"#,
    },
    ErrorEntry {
        code: "MKY-R010",
        short: "value cannot be indexed",
        long: r#"## MKY-R010: value cannot be indexed

`x[i]` works on arrays (with an integer index) and hashes. Indexing
past the end of an array or with a missing key yields `null` instead.
"#,
    },
    ErrorEntry {
        code: "MKY-R011",
        short: "value is not callable",
        long: r#"## MKY-R011: value is not callable

Only functions and builtins can be called.

**Example:**

    let x = 5;
    x();
"#,
    },
    ErrorEntry {
        code: "MKY-R012",
        short: "wrong number of arguments",
        long: r#"## MKY-R012: wrong number of arguments

A function was called with a different number of arguments than it
declares parameters. There are no optional or variadic parameters.
"#,
    },
    ErrorEntry {
        code: "MKY-R013",
        short: "internal VM error",
        long: r#"## MKY-R013: internal VM error

An instruction referred to a constant, builtin or free variable that
does not exist. This indicates a compiler bug, not a user error.
"#,
    },
];

/// Look up an error entry by code (e.g. `"MKY-R008"`).
pub fn lookup(code: &str) -> Option<&'static ErrorEntry> {
    REGISTRY.iter().find(|e| e.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileError;
    use crate::object::ObjectKind;
    use crate::source::Span;
    use crate::vm::VmError;

    #[test]
    fn lookup_known_code() {
        let e = lookup("MKY-R008").expect("MKY-R008 should be in registry");
        assert_eq!(e.short, "division by zero");
        assert!(e.long.contains("MKY-R008"));
    }

    #[test]
    fn lookup_unknown_returns_none() {
        assert!(lookup("MKY-XXXX").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn all_codes_unique() {
        let mut codes: Vec<&str> = REGISTRY.iter().map(|e| e.code).collect();
        codes.sort_unstable();
        let len_before = codes.len();
        codes.dedup();
        assert_eq!(codes.len(), len_before, "duplicate codes in registry");
    }

    #[test]
    fn every_long_form_names_its_code() {
        for entry in REGISTRY {
            assert!(!entry.short.is_empty(), "{} missing short description", entry.code);
            assert!(entry.long.contains(entry.code), "{} explanation lacks its heading", entry.code);
        }
    }

    #[test]
    fn emitted_codes_are_registered() {
        let compile_errors = [
            CompileError::UndefinedVariable { name: "x".into(), span: Span::UNKNOWN },
            CompileError::ReturnOutsideFunction { span: Span::UNKNOWN },
        ];
        for e in &compile_errors {
            assert!(lookup(e.code()).is_some(), "{} not registered", e.code());
        }
        let vm_errors = [
            VmError::StackOverflow,
            VmError::FrameOverflow { max: 1 },
            VmError::DivisionByZero,
            VmError::NotCallable { kind: ObjectKind::Integer },
            VmError::UnknownConstant { index: 0 },
        ];
        for e in &vm_errors {
            assert!(lookup(e.code()).is_some(), "{} not registered", e.code());
        }
        for code in ["MKY-P001", "MKY-P002", "MKY-P003", "MKY-P004", "MKY-P005"] {
            assert!(lookup(code).is_some(), "{code} not registered");
        }
    }
}
