//! A compiler and virtual machine for the Monkey language.
//!
//! Source text is lexed and compiled in a single pass straight to bytecode
//! (no syntax tree is built), then executed on a stack machine with call
//! frames and closures.

pub mod code;
pub mod compiler;
pub mod diagnostic;
pub mod lexer;
pub mod object;
pub mod repl;
pub mod session;
pub mod source;
pub mod vm;
