use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::{self, Write};
use std::path::PathBuf;

use tlox as lox;

use clap::error::ErrorKind;
use clap::Parser as ClapParser;

use lox::error::Reporter;
use lox::interpreter::Interpreter;
use lox::parser::{Parser, ReplParse};
use lox::resolver::Resolver;
use lox::scanner::Scanner;
use lox::stmt::Stmt;
use lox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Script to run; omit for an interactive session
    filename: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,

        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit();
        }

        Err(_) => {
            eprintln!("Usage: tlox [script]");
            std::process::exit(64);
        }
    };

    match args.filename {
        Some(filename) => run_file(filename),

        None => run_prompt(),
    }
}

fn run_file(filename: PathBuf) -> anyhow::Result<()> {
    let mut buf: Vec<u8> = Vec::new();
    let mut reader: BufReader<File> = BufReader::new(File::open(filename)?);
    reader.read_to_end(&mut buf)?;

    let source: String = String::from_utf8(buf)?;

    let reporter: Reporter = Reporter::new();
    let mut interpreter: Interpreter<io::Stdout> = Interpreter::new(io::stdout());

    run(&source, &mut interpreter, &reporter);

    // A static error wins over a runtime error for the exit code.
    if reporter.had_error() {
        std::process::exit(65);
    }
    if reporter.had_runtime_error() {
        std::process::exit(70);
    }

    Ok(())
}

fn run<W: Write>(source: &str, interpreter: &mut Interpreter<W>, reporter: &Reporter) {
    let tokens: Vec<Token> = scan(source, reporter);

    let mut parser: Parser = Parser::new(tokens, reporter);
    let statements: Vec<Stmt> = parser.parse();

    // Stop if there was a syntax error.
    if reporter.had_error() {
        return;
    }

    let mut resolver = Resolver::new(interpreter, reporter);
    resolver.resolve(&statements);

    // Stop if there was a resolution error.
    if reporter.had_error() {
        return;
    }

    interpreter.interpret(&statements, reporter);
}

fn run_prompt() -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut prompt_out = io::stdout();

    let reporter: Reporter = Reporter::new();
    let mut interpreter: Interpreter<io::Stdout> = Interpreter::new(io::stdout());

    let mut input = String::new();
    loop {
        prompt_out.write_all(b"> ")?;
        prompt_out.flush()?;

        input.clear();
        let nbytes: usize = stdin.read_line(&mut input)?;
        if nbytes == 0 {
            break;
        }

        let cleaned: String = input.trim().chars().filter(|&c| c != ';').collect();
        if cleaned == "exit()" {
            break;
        }

        let tokens: Vec<Token> = scan(&input, &reporter);

        let mut parser: Parser = Parser::new(tokens, &reporter);
        let parsed: ReplParse = parser.parse_repl();

        if !reporter.had_error() {
            match parsed {
                ReplParse::Statements(statements) => {
                    let mut resolver = Resolver::new(&mut interpreter, &reporter);
                    resolver.resolve(&statements);

                    if !reporter.had_error() {
                        interpreter.interpret(&statements, &reporter);
                    }
                }

                ReplParse::Expression(expr) => {
                    // The resolver walks statements; wrap, resolve, unwrap.
                    let statements: Vec<Stmt> = vec![Stmt::Expression(expr)];

                    let mut resolver = Resolver::new(&mut interpreter, &reporter);
                    resolver.resolve(&statements);

                    if !reporter.had_error() {
                        if let Some(Stmt::Expression(expr)) = statements.first() {
                            if let Some(value) = interpreter.interpret_expression(expr, &reporter)
                            {
                                println!("= {}", value);
                            }
                        }
                    }
                }
            }
        }

        reporter.reset();
    }

    Ok(())
}

fn scan(source: &str, reporter: &Reporter) -> Vec<Token> {
    Scanner::new(source.as_bytes())
        .filter_map(|result| match result {
            Ok(token) => Some(token),

            Err(error) => {
                reporter.error(&error);
                None
            }
        })
        .collect()
}
