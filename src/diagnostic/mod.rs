pub mod ansi;
pub mod json;
pub mod registry;

use crate::compiler::{CompileError, CompileFailure, ParseError};
use crate::source::Span;
use crate::vm::VmError;

#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

/// An error report. Every diagnostic is an error; the first label is the
/// one the renderers point at.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<&'static str>,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            code: None,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
            suggestion: None,
            source: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_span(mut self, span: Span, label: impl Into<String>) -> Self {
        self.labels.push(Label { span, message: label.into() });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// ---- From impls for the pipeline's error types ----

impl From<&ParseError> for Diagnostic {
    fn from(e: &ParseError) -> Self {
        let d = Diagnostic::error(&e.message).with_code(e.code).with_span(e.span, "here");
        match e.code {
            "MKY-P005" => d.with_suggestion("close the string with a matching `\"`"),
            _ => d,
        }
    }
}

impl From<&CompileError> for Diagnostic {
    fn from(e: &CompileError) -> Self {
        let mut d = Diagnostic::error(e.to_string()).with_code(e.code());
        if let Some(span) = e.span() {
            d = d.with_span(span, "here");
        }
        match e {
            CompileError::UndefinedVariable { name, .. } => {
                d.with_suggestion(format!("bind it first with `let {name} = ...;`"))
            }
            CompileError::ReturnOutsideFunction { .. } => {
                d.with_note("a top-level program ends with its last expression; use `exit;` to stop early")
            }
            CompileError::OperandOverflow { .. } => d,
        }
    }
}

impl From<&VmError> for Diagnostic {
    fn from(e: &VmError) -> Self {
        let d = Diagnostic::error(e.to_string()).with_code(e.code());
        match e {
            VmError::FrameOverflow { .. } => d.with_note("the recursion never reaches a base case"),
            _ => d,
        }
    }
}

/// One diagnostic per parse error, or a single one for any other failure.
pub fn from_compile_failure(failure: &CompileFailure) -> Vec<Diagnostic> {
    match failure {
        CompileFailure::Parse(errors) => errors.iter().map(Diagnostic::from).collect(),
        CompileFailure::Compile(e) => vec![Diagnostic::from(e)],
    }
}
