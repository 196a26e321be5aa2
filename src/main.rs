use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use quartz_lang::err::{Diagnostic, SourceErr};
use quartz_lang::lexer::token::Token;
use quartz_lang::{lexer, parser};

/// What the front end prints once the file is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// The token sequence, one token per line
    Tokens,
    /// The syntax tree
    Ast,
}

/// Tokenizes and parses a Quartz source file.
#[derive(Debug, Parser)]
#[command(name = "quartz", about = "Quartz language front end")]
struct Cli {
    /// The source file to read
    file: PathBuf,

    /// What to print
    #[arg(long, value_enum, default_value_t = Emit::Ast)]
    emit: Emit,

    /// Increase logging verbosity (-v: debug, -vv+: trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive_for_verbosity(cli.verbose))),
        )
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let code = match read_source(&cli.file) {
        Ok(code) => code,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    match run(&code, cli.emit) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.full_msg());
            ExitCode::FAILURE
        }
    }
}

fn read_source(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => format!("file not found: {}", path.display()),
        _ => format!("cannot read {}: {e}", path.display()),
    })
}

fn run(code: &str, emit: Emit) -> Result<(), Diagnostic<SourceErr>> {
    let tokens = lexer::tokenize(code)?;

    match emit {
        Emit::Tokens => tokens.iter().for_each(|t| println!("{}", describe(t))),
        Emit::Ast => println!("{:#?}", parser::parse(tokens)?),
    }
    Ok(())
}

fn describe(t: &Token) -> String {
    format!("{}:{}\t{:?}\t{:?}", t.line(), t.column(), t.tag(), t.text())
}

fn directive_for_verbosity(v: u8) -> &'static str {
    // the target is the library's module path, where all events are emitted
    match v {
        0 => "quartz_lang=warn",
        1 => "quartz_lang=debug",
        _ => "quartz_lang=trace",
    }
}

#[cfg(test)]
mod tests {
    use quartz_lang::err::QzErr;

    use super::*;

    #[test]
    fn directive_defaults() {
        assert_eq!(directive_for_verbosity(0), "quartz_lang=warn");
        assert_eq!(directive_for_verbosity(1), "quartz_lang=debug");
        assert_eq!(directive_for_verbosity(5), "quartz_lang=trace");
    }

    #[test]
    fn read_source_reports_cause() {
        let missing = Path::new("tests/files/does_not_exist.qz");
        assert_eq!(read_source(missing).unwrap_err(), "file not found: tests/files/does_not_exist.qz");

        // a directory exists but cannot be read as a file
        let msg = read_source(Path::new("tests/files")).unwrap_err();
        assert!(msg.starts_with("cannot read tests/files: "), "{msg}");

        assert!(read_source(Path::new("tests/files/inventory.qz")).is_ok());
    }

    #[test]
    fn run_reports_first_fault() {
        let err = run("x := 1\ny := )", Emit::Tokens).unwrap_err();
        assert_eq!(err.err().err_name(), "lexical error");
        assert_eq!(err.line(), 2);
    }
}
