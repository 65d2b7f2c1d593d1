use std::rc::Rc;

use crate::code::{self, Instructions, Opcode};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::object::{CompiledFunction, Object};
use crate::source::Span;

pub mod parse_rule;
pub mod symbol_table;

use parse_rule::{Infix, Precedence, Prefix};
use symbol_table::{Scope, Symbol, SymbolScope, SymbolTable};

// ── Errors ───────────────────────────────────────────────────────────

/// A syntax error. These are collected rather than returned one at a time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub code: &'static str,
    pub message: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("undefined variable {name}")]
    UndefinedVariable { name: String, span: Span },
    #[error("can only return from functions")]
    ReturnOutsideFunction { span: Span },
    #[error("operand {operand} of {op} does not fit (max {max})")]
    OperandOverflow { op: Opcode, operand: usize, max: usize },
}

impl CompileError {
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::UndefinedVariable { .. } => "MKY-C001",
            CompileError::ReturnOutsideFunction { .. } => "MKY-C002",
            CompileError::OperandOverflow { .. } => "MKY-C003",
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::UndefinedVariable { span, .. }
            | CompileError::ReturnOutsideFunction { span } => Some(*span),
            CompileError::OperandOverflow { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileFailure {
    #[error("{} parse error(s)", .0.len())]
    Parse(Vec<ParseError>),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Why a single statement stopped compiling.
enum Failure {
    Parse(ParseError),
    Compile(CompileError),
}

impl From<ParseError> for Failure {
    fn from(e: ParseError) -> Self {
        Failure::Parse(e)
    }
}

impl From<CompileError> for Failure {
    fn from(e: CompileError) -> Self {
        Failure::Compile(e)
    }
}

type Step<T = ()> = Result<T, Failure>;

// ── Output and carried state ─────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Object>,
}

/// Everything one compilation hands to the next: global bindings and the
/// constant pool that global closures still refer to.
#[derive(Debug, Clone)]
pub struct CompilerState {
    pub symbols: SymbolTable,
    pub constants: Vec<Object>,
}

impl Default for CompilerState {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerState {
    pub fn new() -> Self {
        CompilerState { symbols: SymbolTable::with_builtins(), constants: Vec::new() }
    }
}

/// Compile a whole program in a fresh state.
pub fn compile(source: &str) -> Result<Bytecode, CompileFailure> {
    compile_with_state(source, CompilerState::new()).map(|(bytecode, _)| bytecode)
}

/// Compile on top of previously accumulated state and return the new state
/// alongside the bytecode. On failure the input state is simply dropped, so
/// callers that want to retry keep their own copy.
pub fn compile_with_state(
    source: &str,
    state: CompilerState,
) -> Result<(Bytecode, CompilerState), CompileFailure> {
    let mut compiler = Compiler::with_state(source, state);
    compiler.compile_program();
    compiler.finish()
}

// ── Compiler ─────────────────────────────────────────────────────────

const MAX_ERRORS: usize = 20;
const PLACEHOLDER: usize = 9999;

#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    op: Opcode,
    position: usize,
}

#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last: Option<EmittedInstruction>,
    previous: Option<EmittedInstruction>,
}

/// Parser and code generator in one: every grammar rule emits its bytecode as
/// soon as it has recognised its input, so no syntax tree is ever built.
pub struct Compiler<'src> {
    source: &'src str,
    lexer: Lexer<'src>,
    cur: Token,
    peek: Token,
    errors: Vec<ParseError>,
    compile_error: Option<CompileError>,
    constants: Vec<Object>,
    symbols: SymbolTable,
    scopes: Vec<CompilationScope>,
    /// Name from `let NAME = fn ...`, consumed by the function literal that follows.
    pending_fn_name: Option<String>,
    /// Unclosed `{` between the start of the statement and the cursor.
    nesting: usize,
}

impl<'src> Compiler<'src> {
    pub fn with_state(source: &'src str, state: CompilerState) -> Self {
        let mut lexer = Lexer::new(source);
        let cur = lexer.next_token();
        let peek = lexer.next_token();
        Compiler {
            source,
            lexer,
            cur,
            peek,
            errors: Vec::new(),
            compile_error: None,
            constants: state.constants,
            symbols: state.symbols,
            scopes: vec![CompilationScope::default()],
            pending_fn_name: None,
            nesting: 0,
        }
    }

    pub fn compile_program(&mut self) {
        while self.cur.kind != TokenKind::Eof && self.errors.len() < MAX_ERRORS {
            let halts = self.cur.kind == TokenKind::Exit;
            match self.statement() {
                Ok(()) if halts => break,
                Ok(()) => {}
                Err(failure) => {
                    self.record(failure);
                    self.recover();
                }
            }
            self.advance();
        }
    }

    /// Parse errors win over a compile error: the program text is not
    /// trustworthy enough for the compile error to mean anything.
    pub fn finish(self) -> Result<(Bytecode, CompilerState), CompileFailure> {
        if !self.errors.is_empty() {
            return Err(CompileFailure::Parse(self.errors));
        }
        if let Some(e) = self.compile_error {
            return Err(CompileFailure::Compile(e));
        }
        let instructions = self.scopes.into_iter().next().map(|s| s.instructions).unwrap_or_default();
        let bytecode = Bytecode { instructions, constants: self.constants.clone() };
        Ok((bytecode, CompilerState { symbols: self.symbols, constants: self.constants }))
    }

    fn record(&mut self, failure: Failure) {
        match failure {
            Failure::Parse(e) => self.errors.push(e),
            Failure::Compile(e) => {
                if self.compile_error.is_none() {
                    self.compile_error = Some(e);
                }
            }
        }
    }

    /// Unwind any half-compiled function literals, then skip to the end of
    /// the broken statement: a `;` outside every brace, or just before a
    /// statement keyword.
    fn recover(&mut self) {
        while self.scopes.len() > 1 {
            self.scopes.pop();
            self.symbols.pop_scope();
        }
        self.pending_fn_name = None;

        let mut depth = std::mem::take(&mut self.nesting);
        loop {
            match self.cur.kind {
                TokenKind::Eof => return,
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth = depth.saturating_sub(1),
                TokenKind::Semicolon if depth == 0 => return,
                _ => {}
            }
            if depth == 0
                && matches!(self.peek.kind, TokenKind::Let | TokenKind::Return | TokenKind::Exit)
            {
                return;
            }
            self.advance();
        }
    }

    // ---- Token cursor ----

    fn advance(&mut self) {
        self.cur = self.peek;
        self.peek = self.lexer.next_token();
    }

    fn literal(&self, tok: Token) -> &'src str {
        tok.literal(self.source)
    }

    fn expect_peek(&mut self, kind: TokenKind) -> Step {
        if self.peek.kind == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.parse_error(
                "MKY-P001",
                format!("expected next token to be {kind}, got {} instead", self.peek.kind),
                self.peek.span(),
            ))
        }
    }

    fn skip_semicolon(&mut self) {
        if self.peek.kind == TokenKind::Semicolon {
            self.advance();
        }
    }

    fn parse_error(&self, code: &'static str, message: String, span: Span) -> Failure {
        Failure::Parse(ParseError { code, message, span })
    }

    fn no_prefix_error(&self) -> Failure {
        let tok = self.cur;
        match tok.kind {
            TokenKind::Illegal => self.parse_error(
                "MKY-P004",
                format!("illegal character '{}'", self.literal(tok)),
                tok.span(),
            ),
            TokenKind::Unterminated => self.parse_error(
                "MKY-P005",
                "unterminated string literal".to_string(),
                // point at the opening quote
                Span::new(tok.start.saturating_sub(1), 1),
            ),
            kind => self.parse_error(
                "MKY-P002",
                format!("no prefix parse function for {kind} found"),
                tok.span(),
            ),
        }
    }

    // ---- Emission ----

    fn scope(&self) -> &CompilationScope {
        let last = self.scopes.len() - 1;
        &self.scopes[last]
    }

    fn scope_mut(&mut self) -> &mut CompilationScope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn check_operands(op: Opcode, operands: &[usize]) -> Result<(), CompileError> {
        for (&width, &operand) in op.operand_widths().iter().zip(operands) {
            let max = code::max_operand(width);
            if operand > max {
                return Err(CompileError::OperandOverflow { op, operand, max });
            }
        }
        Ok(())
    }

    fn emit(&mut self, op: Opcode, operands: &[usize]) -> Result<usize, CompileError> {
        Self::check_operands(op, operands)?;
        let ins = code::make(op, operands);
        let scope = self.scope_mut();
        let position = scope.instructions.len();
        scope.instructions.extend_from_slice(&ins);
        scope.previous = scope.last.replace(EmittedInstruction { op, position });
        Ok(position)
    }

    fn add_constant(&mut self, obj: Object) -> usize {
        self.constants.push(obj);
        self.constants.len() - 1
    }

    fn last_instruction_is(&self, op: Opcode) -> bool {
        self.scope().last.is_some_and(|last| last.op == op)
    }

    fn remove_last_pop(&mut self) {
        let scope = self.scope_mut();
        if let Some(last) = scope.last.take() {
            scope.instructions.truncate(last.position);
            scope.last = scope.previous.take();
        }
    }

    fn replace_last_pop_with_return(&mut self) {
        let scope = self.scope_mut();
        if let Some(last) = scope.last.as_mut() {
            scope.instructions[last.position] = Opcode::ReturnValue as u8;
            last.op = Opcode::ReturnValue;
        }
    }

    /// Overwrite the operand of the jump at `position` with `target`.
    fn patch_jump(&mut self, op: Opcode, position: usize, target: usize) -> Result<(), CompileError> {
        Self::check_operands(op, &[target])?;
        let ins = code::make(op, &[target]);
        let scope = self.scope_mut();
        if let Some(slot) = scope.instructions.get_mut(position..position + ins.len()) {
            slot.copy_from_slice(&ins);
        }
        Ok(())
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        self.symbols.push_scope();
    }

    fn leave_scope(&mut self) -> (Instructions, Scope) {
        let instructions = self.scopes.pop().map(|s| s.instructions).unwrap_or_default();
        let scope = self.symbols.pop_scope().unwrap_or_default();
        (instructions, scope)
    }

    fn load_symbol(&mut self, symbol: &Symbol) -> Result<(), CompileError> {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Opcode::GetFree, &[symbol.index]),
            SymbolScope::Function => self.emit(Opcode::CurrentClosure, &[]),
        }?;
        Ok(())
    }

    // ---- Statements ----

    fn statement(&mut self) -> Step {
        match self.cur.kind {
            TokenKind::Let => self.let_statement(),
            TokenKind::Return => self.return_statement(),
            TokenKind::Exit => self.exit_statement(),
            _ => self.expression_statement(),
        }
    }

    fn let_statement(&mut self) -> Step {
        self.expect_peek(TokenKind::Ident)?;
        let name = self.literal(self.cur);
        // defined up front so a function literal can capture its own binding
        let symbol = self.symbols.define(name);
        self.expect_peek(TokenKind::Assign)?;
        self.advance();

        self.pending_fn_name = (self.cur.kind == TokenKind::Function).then(|| name.to_string());
        self.expression(Precedence::Lowest)?;
        self.skip_semicolon();

        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::SetGlobal, &[symbol.index])?,
            _ => self.emit(Opcode::SetLocal, &[symbol.index])?,
        };
        Ok(())
    }

    fn return_statement(&mut self) -> Step {
        if self.scopes.len() == 1 {
            return Err(CompileError::ReturnOutsideFunction { span: self.cur.span() }.into());
        }
        self.advance();
        self.expression(Precedence::Lowest)?;
        self.skip_semicolon();
        self.emit(Opcode::ReturnValue, &[])?;
        Ok(())
    }

    fn exit_statement(&mut self) -> Step {
        self.skip_semicolon();
        self.emit(Opcode::Exit, &[])?;
        Ok(())
    }

    fn expression_statement(&mut self) -> Step {
        self.expression(Precedence::Lowest)?;
        self.skip_semicolon();
        self.emit(Opcode::Pop, &[])?;
        Ok(())
    }

    /// Statements up to the matching `}`. Expects the cursor on `{` and
    /// leaves it on `}`.
    fn block_statement(&mut self) -> Step {
        self.nesting += 1;
        self.advance();
        while !matches!(self.cur.kind, TokenKind::RBrace | TokenKind::Eof) {
            self.statement()?;
            self.advance();
        }
        if self.cur.kind == TokenKind::Eof {
            return Err(self.parse_error(
                "MKY-P001",
                format!("expected next token to be {}, got {} instead", TokenKind::RBrace, TokenKind::Eof),
                self.cur.span(),
            ));
        }
        self.nesting -= 1;
        Ok(())
    }

    // ---- Expressions ----

    fn expression(&mut self, precedence: Precedence) -> Step {
        let Some(prefix) = parse_rule::rule(self.cur.kind).prefix else {
            return Err(self.no_prefix_error());
        };
        self.prefix(prefix)?;

        while self.peek.kind != TokenKind::Semicolon
            && precedence < parse_rule::precedence(self.peek.kind)
        {
            let Some(infix) = parse_rule::rule(self.peek.kind).infix else {
                return Ok(());
            };
            self.advance();
            self.infix(infix)?;
        }
        Ok(())
    }

    fn prefix(&mut self, prefix: Prefix) -> Step {
        match prefix {
            Prefix::Identifier => self.identifier(),
            Prefix::Integer => self.integer_literal(),
            Prefix::String => self.string_literal(),
            Prefix::Boolean => self.boolean(),
            Prefix::Unary => self.unary(),
            Prefix::Grouped => self.grouped(),
            Prefix::If => self.if_expression(),
            Prefix::Function => self.function_literal(),
            Prefix::Array => self.array_literal(),
            Prefix::Hash => self.hash_literal(),
        }
    }

    fn infix(&mut self, infix: Infix) -> Step {
        match infix {
            Infix::Binary(op) => self.binary(op),
            Infix::Call => self.call(),
            Infix::Index => self.index(),
        }
    }

    fn identifier(&mut self) -> Step {
        let name = self.literal(self.cur);
        let Some(symbol) = self.symbols.resolve(name) else {
            return Err(CompileError::UndefinedVariable {
                name: name.to_string(),
                span: self.cur.span(),
            }
            .into());
        };
        self.load_symbol(&symbol)?;
        Ok(())
    }

    fn integer_literal(&mut self) -> Step {
        let text = self.literal(self.cur);
        let Ok(value) = text.parse::<i64>() else {
            return Err(self.parse_error(
                "MKY-P003",
                format!("could not parse {text} as integer"),
                self.cur.span(),
            ));
        };
        let index = self.add_constant(Object::Integer(value));
        self.emit(Opcode::Constant, &[index])?;
        Ok(())
    }

    fn string_literal(&mut self) -> Step {
        let index = self.add_constant(Object::string(self.literal(self.cur)));
        self.emit(Opcode::Constant, &[index])?;
        Ok(())
    }

    fn boolean(&mut self) -> Step {
        let op = if self.cur.kind == TokenKind::True { Opcode::True } else { Opcode::False };
        self.emit(op, &[])?;
        Ok(())
    }

    fn unary(&mut self) -> Step {
        let op = if self.cur.kind == TokenKind::Bang { Opcode::Bang } else { Opcode::Minus };
        self.advance();
        self.expression(Precedence::Prefix)?;
        self.emit(op, &[])?;
        Ok(())
    }

    fn binary(&mut self, op: Opcode) -> Step {
        let precedence = parse_rule::precedence(self.cur.kind);
        self.advance();
        self.expression(precedence)?;
        self.emit(op, &[])?;
        Ok(())
    }

    fn grouped(&mut self) -> Step {
        self.advance();
        self.expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RParen)
    }

    fn if_expression(&mut self) -> Step {
        self.expect_peek(TokenKind::LParen)?;
        self.advance();
        self.expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RParen)?;

        let jump_not_truthy = self.emit(Opcode::JumpNotTruthy, &[PLACEHOLDER])?;
        self.expect_peek(TokenKind::LBrace)?;
        self.branch()?;

        let jump = self.emit(Opcode::Jump, &[PLACEHOLDER])?;
        let after_consequence = self.scope().instructions.len();
        self.patch_jump(Opcode::JumpNotTruthy, jump_not_truthy, after_consequence)?;

        if self.peek.kind == TokenKind::Else {
            self.advance();
            self.expect_peek(TokenKind::LBrace)?;
            self.branch()?;
        } else {
            self.emit(Opcode::Null, &[])?;
        }

        let after_alternative = self.scope().instructions.len();
        self.patch_jump(Opcode::Jump, jump, after_alternative)?;
        Ok(())
    }

    /// An `if` arm leaves exactly one value: its trailing expression, or null.
    fn branch(&mut self) -> Step {
        self.block_statement()?;
        if self.last_instruction_is(Opcode::Pop) {
            self.remove_last_pop();
        } else {
            self.emit(Opcode::Null, &[])?;
        }
        Ok(())
    }

    fn function_literal(&mut self) -> Step {
        let name = self.pending_fn_name.take();
        self.enter_scope();
        if let Some(name) = name {
            self.symbols.define_function_name(&name);
        }

        self.expect_peek(TokenKind::LParen)?;
        let num_parameters = self.function_parameters()?;
        self.expect_peek(TokenKind::LBrace)?;
        self.block_statement()?;

        if self.last_instruction_is(Opcode::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(Opcode::ReturnValue) {
            self.emit(Opcode::Return, &[])?;
        }

        let (instructions, scope) = self.leave_scope();
        for symbol in &scope.free_symbols {
            self.load_symbol(symbol)?;
        }

        let func = CompiledFunction { instructions, num_locals: scope.num_definitions, num_parameters };
        let index = self.add_constant(Object::CompiledFunction(Rc::new(func)));
        self.emit(Opcode::Closure, &[index, scope.free_symbols.len()])?;
        Ok(())
    }

    fn function_parameters(&mut self) -> Step<usize> {
        if self.peek.kind == TokenKind::RParen {
            self.advance();
            return Ok(0);
        }

        self.expect_peek(TokenKind::Ident)?;
        let name = self.literal(self.cur);
        self.symbols.define(name);
        let mut count = 1;

        while self.peek.kind == TokenKind::Comma {
            self.advance();
            self.expect_peek(TokenKind::Ident)?;
            let name = self.literal(self.cur);
            self.symbols.define(name);
            count += 1;
        }

        self.expect_peek(TokenKind::RParen)?;
        Ok(count)
    }

    fn call(&mut self) -> Step {
        let argc = self.expression_list(TokenKind::RParen)?;
        self.emit(Opcode::Call, &[argc])?;
        Ok(())
    }

    /// Comma-separated expressions up to `end`; returns how many were compiled.
    fn expression_list(&mut self, end: TokenKind) -> Step<usize> {
        if self.peek.kind == end {
            self.advance();
            return Ok(0);
        }

        self.advance();
        self.expression(Precedence::Lowest)?;
        let mut count = 1;

        while self.peek.kind == TokenKind::Comma {
            self.advance();
            self.advance();
            self.expression(Precedence::Lowest)?;
            count += 1;
        }

        self.expect_peek(end)?;
        Ok(count)
    }

    fn array_literal(&mut self) -> Step {
        let count = self.expression_list(TokenKind::RBracket)?;
        self.emit(Opcode::Array, &[count])?;
        Ok(())
    }

    fn index(&mut self) -> Step {
        self.advance();
        self.expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RBracket)?;
        self.emit(Opcode::Index, &[])?;
        Ok(())
    }

    fn hash_literal(&mut self) -> Step {
        self.nesting += 1;
        let mut pairs = 0;
        while self.peek.kind != TokenKind::RBrace {
            self.advance();
            self.expression(Precedence::Lowest)?;
            self.expect_peek(TokenKind::Colon)?;
            self.advance();
            self.expression(Precedence::Lowest)?;
            pairs += 1;

            if self.peek.kind != TokenKind::RBrace {
                self.expect_peek(TokenKind::Comma)?;
            }
        }
        self.advance();
        self.nesting -= 1;

        self.emit(Opcode::Hash, &[pairs * 2])?;
        Ok(())
    }
}
