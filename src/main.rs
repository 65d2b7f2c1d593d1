use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use monkey::compiler::{self, Bytecode};
use monkey::diagnostic::{self, ansi::AnsiRenderer, registry, Diagnostic};
use monkey::object::Object;
use monkey::session::{self, RunError};
use monkey::{code, repl};

const EXIT_UNREADABLE: u8 = 74;
const EXIT_USAGE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "monkey", version, about = "Compile and run Monkey programs")]
struct Cli {
    /// Program to run. Starts the interactive prompt when omitted.
    file: Option<PathBuf>,

    /// Report errors as JSON lines on stderr
    #[arg(long)]
    json: bool,

    /// Never colour error reports
    #[arg(long)]
    no_color: bool,

    /// Print the compiled bytecode instead of running it
    #[arg(long)]
    disassemble: bool,

    /// Explain an error code, e.g. MKY-R008
    #[arg(long, value_name = "CODE")]
    explain: Option<String>,
}

struct Reporter {
    json: bool,
    ansi: AnsiRenderer,
}

impl Reporter {
    fn new(cli: &Cli) -> Self {
        let use_color = !cli.no_color && std::io::stderr().is_terminal();
        Reporter { json: cli.json, ansi: AnsiRenderer { use_color } }
    }

    fn report(&self, diagnostics: Vec<Diagnostic>, source: &str) {
        for d in diagnostics {
            let d = d.with_source(source);
            if self.json {
                eprintln!("{}", diagnostic::json::render(&d));
            } else {
                eprint!("{}", self.ansi.render(&d));
            }
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(code) = &cli.explain {
        return explain(code);
    }

    let Some(path) = &cli.file else {
        return match repl::start() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("monkey: {e}");
                ExitCode::FAILURE
            }
        };
    };

    let reporter = Reporter::new(&cli);
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let d = Diagnostic::error(format!("cannot read {}: {e}", path.display()));
            reporter.report(vec![d], "");
            return ExitCode::from(EXIT_UNREADABLE);
        }
    };

    if cli.disassemble {
        return match compiler::compile(&source) {
            Ok(bytecode) => {
                print!("{}", disassemble(&bytecode));
                ExitCode::SUCCESS
            }
            Err(failure) => {
                reporter.report(diagnostic::from_compile_failure(&failure), &source);
                ExitCode::from(RunError::from(failure).exit_code() as u8)
            }
        };
    }

    match session::run_source(&source) {
        Ok(Object::Null) => ExitCode::SUCCESS,
        Ok(value) => {
            println!("{value}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let diagnostics = match &err {
                RunError::Parse(errors) => errors.iter().map(Diagnostic::from).collect(),
                RunError::Compile(e) => vec![Diagnostic::from(e)],
                RunError::Runtime(e) => vec![Diagnostic::from(e)],
            };
            reporter.report(diagnostics, &source);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn explain(code: &str) -> ExitCode {
    match registry::lookup(code) {
        Some(entry) => {
            print!("{}", entry.long);
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("unknown error code: {code}");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

/// The main program followed by every function in the constant pool.
fn disassemble(bytecode: &Bytecode) -> String {
    let mut out = String::from("== main ==\n");
    out.push_str(&code::disassemble(&bytecode.instructions));
    for (index, constant) in bytecode.constants.iter().enumerate() {
        if let Object::CompiledFunction(func) = constant {
            out.push_str(&format!(
                "\n== constant {index}: fn/{} ({} locals) ==\n",
                func.num_parameters, func.num_locals
            ));
            out.push_str(&code::disassemble(&func.instructions));
        }
    }
    out
}
