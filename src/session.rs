use crate::compiler::{self, CompileError, CompileFailure, CompilerState, ParseError};
use crate::object::Object;
use crate::vm::{Vm, VmError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RunError {
    #[error("{} parse error(s)", .0.len())]
    Parse(Vec<ParseError>),
    #[error(transparent)]
    Compile(CompileError),
    #[error(transparent)]
    Runtime(#[from] VmError),
}

impl From<CompileFailure> for RunError {
    fn from(failure: CompileFailure) -> Self {
        match failure {
            CompileFailure::Parse(errors) => RunError::Parse(errors),
            CompileFailure::Compile(e) => RunError::Compile(e),
        }
    }
}

impl RunError {
    /// Process exit status for a file run that failed this way.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Parse(_) => 77,
            RunError::Compile(_) => 78,
            RunError::Runtime(_) => 79,
        }
    }
}

/// Compile and run a whole program in a fresh state, returning the last
/// value it popped (a trailing `let` yields the value it bound).
pub fn run_source(source: &str) -> Result<Object, RunError> {
    let bytecode = compiler::compile(source)?;
    Ok(crate::vm::run(bytecode)?)
}

/// The result of one successful `Session::eval`.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub value: Object,
    /// The input ran an `exit` statement.
    pub halted: bool,
}

/// Compiler state and global slots carried from one input to the next.
#[derive(Debug, Default)]
pub struct Session {
    state: CompilerState,
    globals: Vec<Object>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    pub fn eval(&mut self, source: &str) -> Result<Evaluation, RunError> {
        // a failed compile must leave the session as it was
        let (bytecode, state) = compiler::compile_with_state(source, self.state.clone())?;
        self.state = state;

        let mut vm = Vm::with_globals(bytecode, std::mem::take(&mut self.globals));
        let outcome = vm.run();
        let value = vm.last_popped();
        let halted = vm.halted();
        self.globals = vm.into_globals();

        outcome?;
        Ok(Evaluation { value, halted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(src: &str) -> String {
        run_source(src).unwrap().to_string()
    }

    #[test]
    fn run_source_returns_last_value() {
        assert_eq!(value("let x = 2; x * 21"), "42");
        assert_eq!(value("\"mon\" + \"key\""), "monkey");
        assert_eq!(value("let a = [1, 2, 3]; a[1]"), "2");
    }

    #[test]
    fn trailing_let_yields_the_bound_value() {
        assert_eq!(value("let x = 1;"), "1");
        assert_eq!(value("let s = \"a\"; let t = s + \"b\";"), "ab");
        assert!(value("let f = fn() { 1 };").starts_with("Closure["));
    }

    #[test]
    fn run_source_sorts_failures() {
        assert!(matches!(run_source("let = 1;"), Err(RunError::Parse(_))));
        assert!(matches!(run_source("nope;"), Err(RunError::Compile(CompileError::UndefinedVariable { .. }))));
        assert!(matches!(run_source("1 / 0"), Err(RunError::Runtime(VmError::DivisionByZero))));
    }

    #[test]
    fn exit_codes_are_distinct() {
        let parse = run_source("let = 1;").unwrap_err();
        let compile = run_source("nope;").unwrap_err();
        let runtime = run_source("-true").unwrap_err();
        assert_eq!(parse.exit_code(), 77);
        assert_eq!(compile.exit_code(), 78);
        assert_eq!(runtime.exit_code(), 79);
    }

    #[test]
    fn parse_error_count_in_message() {
        let err = run_source("let = 1; let y = ;").unwrap_err();
        assert_eq!(err.to_string(), "2 parse error(s)");
    }

    #[test]
    fn session_carries_globals_and_functions() {
        let mut session = Session::new();
        session.eval("let a = 40;").unwrap();
        session.eval("let add = fn(x, y) { x + y };").unwrap();
        let out = session.eval("add(a, 2)").unwrap();
        assert_eq!(out.value.to_string(), "42");
        assert!(!out.halted);
    }

    #[test]
    fn failed_compile_leaves_session_untouched() {
        let mut session = Session::new();
        session.eval("let a = 1;").unwrap();
        assert!(session.eval("let b = missing;").is_err());
        assert!(matches!(
            session.eval("b"),
            Err(RunError::Compile(CompileError::UndefinedVariable { .. }))
        ));
        assert_eq!(session.eval("a").unwrap().value.to_string(), "1");
    }

    #[test]
    fn runtime_failure_keeps_earlier_writes() {
        let mut session = Session::new();
        let err = session.eval("let a = 5; let b = a / 0;").unwrap_err();
        assert!(matches!(err, RunError::Runtime(VmError::DivisionByZero)));
        assert_eq!(session.eval("a").unwrap().value.to_string(), "5");
        // `b` was defined at compile time but never written
        assert_eq!(session.eval("b").unwrap().value.to_string(), "null");
    }

    #[test]
    fn exit_reports_halt() {
        let mut session = Session::new();
        let out = session.eval("exit;").unwrap();
        assert!(out.halted);
    }
}
