//! Interactive read-eval-print loop.
//!
//! Every line is compiled on top of the definitions made by earlier lines,
//! so globals and functions persist for the whole session. With the `repl`
//! feature lines are read through rustyline with history kept in
//! `$HOME/.monkey_history`; without it they come straight from stdin.

use std::io::{self, Write};

use crate::compiler::ParseError;
use crate::session::{RunError, Session};

pub const PROMPT: &str = ">> ";

const MONKEY_FACE: &str = r#"            __,__
   .--.  .-"     "-.  .--.
  / .. \/  .-. .-.  \/ .. \
 | |  '|  /   Y   \  |'  | |
 | \   \  \ 0 | 0 /  /   / |
  \ '- ,\.-"""""""-./, -' /
   ''-' /_   ^ ^   _\ '-''
       |  \._   _./  |
       \   \ '~' /   /
        '._ '-=-' _.'
           '-----'
"#;

/// What the loop should do after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Run the loop until end of input, an interrupt, or an `exit` statement.
pub fn start() -> io::Result<()> {
    let mut input = Input::new()?;
    let mut session = Session::new();
    let stdout = io::stdout();

    while let Some(line) = input.read_line(PROMPT)? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        input.add_history(line);
        if respond(&mut session, line, &mut stdout.lock())? == Flow::Stop {
            break;
        }
    }

    input.finish();
    Ok(())
}

/// Evaluate one line and write its value or its errors to `out`.
pub fn respond(session: &mut Session, line: &str, out: &mut impl Write) -> io::Result<Flow> {
    match session.eval(line) {
        Ok(evaluation) if evaluation.halted => Ok(Flow::Stop),
        Ok(evaluation) => {
            writeln!(out, "{}", evaluation.value)?;
            Ok(Flow::Continue)
        }
        Err(RunError::Parse(errors)) => {
            print_parse_errors(out, &errors)?;
            Ok(Flow::Continue)
        }
        Err(RunError::Compile(e)) => {
            writeln!(out, "Woops! Compilation failed:\n {e}")?;
            Ok(Flow::Continue)
        }
        Err(RunError::Runtime(e)) => {
            writeln!(out, "Woops! Executing bytecode failed:\n {e}")?;
            Ok(Flow::Continue)
        }
    }
}

fn print_parse_errors(out: &mut impl Write, errors: &[ParseError]) -> io::Result<()> {
    write!(out, "{MONKEY_FACE}")?;
    writeln!(out, "Woops! We ran into some monkey business here!")?;
    writeln!(out, " parse errors:")?;
    for e in errors {
        writeln!(out, "\t{e}")?;
    }
    Ok(())
}

// ── Line input ───────────────────────────────────────────────────────

#[cfg(feature = "repl")]
struct Input {
    editor: rustyline::DefaultEditor,
    history: Option<std::path::PathBuf>,
}

#[cfg(feature = "repl")]
impl Input {
    fn new() -> io::Result<Self> {
        let mut editor = rustyline::DefaultEditor::new().map_err(io::Error::other)?;
        let history = std::env::var("HOME")
            .ok()
            .map(|home| std::path::PathBuf::from(home).join(".monkey_history"));
        if let Some(path) = &history {
            let _ = editor.load_history(path);
        }
        Ok(Input { editor, history })
    }

    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        use rustyline::error::ReadlineError;
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(io::Error::other(e)),
        }
    }

    fn add_history(&mut self, line: &str) {
        let _ = self.editor.add_history_entry(line);
    }

    fn finish(&mut self) {
        if let Some(path) = &self.history {
            let _ = self.editor.save_history(path);
        }
    }
}

#[cfg(not(feature = "repl"))]
struct Input {
    stdin: io::Stdin,
}

#[cfg(not(feature = "repl"))]
impl Input {
    fn new() -> io::Result<Self> {
        Ok(Input { stdin: io::stdin() })
    }

    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;
        let mut line = String::new();
        if self.stdin.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    fn add_history(&mut self, _line: &str) {}

    fn finish(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(session: &mut Session, line: &str) -> (Flow, String) {
        let mut out = Vec::new();
        let flow = respond(session, line, &mut out).unwrap();
        (flow, String::from_utf8(out).unwrap())
    }

    #[test]
    fn prints_values_across_lines() {
        let mut session = Session::new();
        feed(&mut session, "let double = fn(x) { x * 2 };");
        let (flow, out) = feed(&mut session, "double(21)");
        assert_eq!(flow, Flow::Continue);
        assert_eq!(out, "42\n");
    }

    #[test]
    fn parse_errors_get_the_banner() {
        let mut session = Session::new();
        let (flow, out) = feed(&mut session, "let = 1; let y = ;");
        assert_eq!(flow, Flow::Continue);
        assert!(out.contains("Woops! We ran into some monkey business here!\n parse errors:\n"));
        assert_eq!(out.lines().filter(|l| l.starts_with('\t')).count(), 2, "got:\n{out}");
    }

    #[test]
    fn compile_and_runtime_errors_are_reported() {
        let mut session = Session::new();
        let (_, out) = feed(&mut session, "missing");
        assert_eq!(out, "Woops! Compilation failed:\n undefined variable missing\n");
        let (_, out) = feed(&mut session, "1 + true");
        assert_eq!(out, "Woops! Executing bytecode failed:\n unsupported types for binary operation: INTEGER + BOOLEAN\n");
    }

    #[test]
    fn exit_stops_the_loop() {
        let mut session = Session::new();
        let (flow, out) = feed(&mut session, "exit;");
        assert_eq!(flow, Flow::Stop);
        assert!(out.is_empty());
    }
}
