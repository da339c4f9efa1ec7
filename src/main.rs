use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use rill::ast::Ast;
use rill::error::Diagnostics;
use rill::interpreter::Interpreter;
use rill::parser::{Parser, Stmt};
use rill::resolver::Resolver;
use rill::scanner::Scanner;
use rill::token::Token;

/// Exit code for a usage error (wrong arguments).
const EX_USAGE: i32 = 64;

/// Exit code when any static diagnostic (lex/parse/resolve) occurred.
const EX_DATAERR: i32 = 65;

/// Exit code when a runtime error occurred.
const EX_SOFTWARE: i32 = 70;

#[derive(ClapParser, Debug)]
#[command(version, about = "Rill language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Emit the token stream as JSON instead of one token per line
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: PathBuf },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: PathBuf },

    /// Runs a script, or starts an interactive session when no file is given
    Run { filename: Option<PathBuf> },
}

/// Map a source file into memory; the scanner lexes straight out of the map.
fn map_file(filename: &PathBuf) -> Result<Mmap> {
    info!("Mapping file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;

    // SAFETY: the map is read-only and lives only for this run; concurrent
    // truncation of the source file is outside the supported contract.
    let mmap = unsafe { Mmap::map(&file) }.context(format!("Failed to map file {:?}", filename))?;

    std::str::from_utf8(&mmap).context(format!("File {:?} is not valid UTF-8", filename))?;

    info!("Mapped {} bytes from {:?}", mmap.len(), filename);

    Ok(mmap)
}

fn init_logger() -> Result<()> {
    // Create or open the log file
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // Configure env_logger to write to file with module path and source line
    Builder::new()
        .format(|buf, record| {
            // Strip 'rill::' from module path
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rill::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

/// Pull every token out of the scanner, routing lexical errors into the sink
/// so scanning reports all of them in one pass.
fn collect_tokens<'a>(src: &'a [u8], diagnostics: &mut Diagnostics) -> Vec<Token<'a>> {
    let mut tokens: Vec<Token<'a>> = Vec::new();

    for result in Scanner::new(src) {
        match result {
            Ok(token) => tokens.push(token),
            Err(e) => diagnostics.report(e),
        }
    }

    tokens
}

fn print_diagnostics(diagnostics: &Diagnostics) {
    for error in diagnostics.errors() {
        eprintln!("{}", error);
    }
}

/// Execute a whole script file: scan, parse, resolve, interpret.
///
/// Interpretation only starts when the earlier passes produced no
/// diagnostics; exit codes follow the CLI contract (65 static, 70 runtime).
fn run_file(filename: PathBuf) -> Result<()> {
    let mmap = map_file(&filename)?;

    let mut diagnostics = Diagnostics::new();

    let tokens = collect_tokens(&mmap, &mut diagnostics);

    let mut parser = Parser::new(&tokens, &mut diagnostics);
    let program = parser.parse();

    if diagnostics.had_errors() {
        print_diagnostics(&diagnostics);
        process::exit(EX_DATAERR);
    }

    info!("Parsed {} statements", program.len());

    let mut interpreter = Interpreter::new();

    {
        let mut resolver = Resolver::new(&mut interpreter, &mut diagnostics);
        resolver.resolve(&program);
    }

    if diagnostics.had_errors() {
        print_diagnostics(&diagnostics);
        process::exit(EX_DATAERR);
    }

    if let Err(e) = interpreter.interpret(&program) {
        debug!("Runtime error: {}", e);

        eprintln!("{}", e);
        process::exit(EX_SOFTWARE);
    }

    Ok(())
}

/// Interactive session: one interpreter for the whole session, a fresh
/// diagnostics sink per line.
///
/// Each line's source, token, and AST buffers are leaked on purpose: values
/// and closures created by the line may be referenced by any later line, so
/// the buffers must live as long as the session does.
fn run_repl() -> Result<()> {
    info!("Starting interactive session");

    let mut interpreter: Interpreter<'static> = Interpreter::new();
    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }

        let src: &'static [u8] = Box::leak(line.into_bytes().into_boxed_slice());

        // Fresh sink per line: a bad line must not poison the next one.
        let mut diagnostics = Diagnostics::new();

        let tokens = collect_tokens(src, &mut diagnostics);
        let tokens: &'static [Token<'static>] = Box::leak(tokens.into_boxed_slice());

        let mut parser = Parser::new(tokens, &mut diagnostics);
        let program = parser.parse();

        if diagnostics.had_errors() {
            print_diagnostics(&diagnostics);
            continue;
        }

        let program: &'static [Stmt<'static>] = Box::leak(program.into_boxed_slice());

        {
            let mut resolver = Resolver::new(&mut interpreter, &mut diagnostics);
            resolver.resolve(program);
        }

        if diagnostics.had_errors() {
            print_diagnostics(&diagnostics);
            continue;
        }

        if let Err(e) = interpreter.interpret(program) {
            eprintln!("{}", e);
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,

        Err(e) => {
            let _ = e.print();
            process::exit(EX_USAGE);
        }
    };

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        // Initialize a minimal logger to avoid "no logger" errors
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => {
            info!("Running Tokenize subcommand");

            let mmap = map_file(&filename)?;
            let mut tokenized = true;

            if json {
                let mut tokens: Vec<Token<'_>> = Vec::new();

                for result in Scanner::new(&mmap) {
                    match result {
                        Ok(token) => tokens.push(token),

                        Err(e) => {
                            tokenized = false;
                            eprintln!("{}", e);
                        }
                    }
                }

                println!("{}", serde_json::to_string_pretty(&tokens)?);
            } else {
                for result in Scanner::new(&mmap) {
                    match result {
                        Ok(token) => {
                            debug!("Scanned token: {}", token);

                            println!("{}", token);
                        }

                        Err(e) => {
                            tokenized = false;
                            eprintln!("{}", e);
                        }
                    }
                }
            }

            if !tokenized {
                debug!("Tokenization failed, exiting with code {}", EX_DATAERR);

                process::exit(EX_DATAERR);
            }

            info!("Tokenization completed successfully");
        }

        Commands::Parse { filename } => {
            info!("Running Parse subcommand");

            let mmap = map_file(&filename)?;

            let mut diagnostics = Diagnostics::new();
            let tokens = collect_tokens(&mmap, &mut diagnostics);

            let mut parser = Parser::new(&tokens, &mut diagnostics);
            let expression = parser.parse_expression();

            match expression {
                Some(expr) if !diagnostics.had_errors() => {
                    let printer = Ast;
                    let ast_str = printer.print(&expr);

                    debug!("AST: {}", ast_str);
                    println!("{}", ast_str);
                }

                _ => {
                    print_diagnostics(&diagnostics);
                    process::exit(EX_DATAERR);
                }
            }

            info!("Parse subcommand completed");
        }

        Commands::Evaluate { filename } => {
            info!("Running Evaluate subcommand");

            let mmap = map_file(&filename)?;

            let mut diagnostics = Diagnostics::new();
            let tokens = collect_tokens(&mmap, &mut diagnostics);

            let mut parser = Parser::new(&tokens, &mut diagnostics);
            let expression = parser.parse_expression();

            let expression = match expression {
                Some(expr) if !diagnostics.had_errors() => expr,

                _ => {
                    print_diagnostics(&diagnostics);
                    process::exit(EX_DATAERR);
                }
            };

            let mut interpreter = Interpreter::new();

            match interpreter.evaluate(&expression) {
                Ok(value) => {
                    debug!("Evaluated to: {}", value);
                    println!("{}", value);
                }

                Err(e) => {
                    eprintln!("{}", e);
                    process::exit(EX_SOFTWARE);
                }
            }

            info!("Evaluate subcommand completed");
        }

        Commands::Run { filename } => match filename {
            Some(filename) => {
                info!("Running Run subcommand");

                run_file(filename)?;
            }

            None => {
                run_repl()?;
            }
        },
    }

    Ok(())
}
