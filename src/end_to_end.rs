//! Code to configure and run the interactive evaluator: one line of text per
//! iteration through the full tokenize → build → evaluate pipeline.

use std::io::{BufRead, Write};

use clap::Parser;

use crate::lexical_analysis::{tokenize, TokenizeError};
use crate::tree_building::{build_tree, BuildError};
use crate::tree_evaluation::{
    evaluate_with_limit, Environment, EvalError, DEFAULT_RECURSION_LIMIT,
};

/// Config for the interactive evaluator. Instantiate via
/// `ReplConfig::parse()`.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct ReplConfig {
    /// Prompt printed before each input line.
    #[arg(short, long, default_value_t = String::from("% "))]
    pub prompt: String,

    /// Maximum evaluation recursion depth before a line is rejected.
    #[arg(short, long, default_value_t = DEFAULT_RECURSION_LIMIT)]
    pub recursion_limit: usize,
}

impl Default for ReplConfig {
    fn default() -> Self {
        return ReplConfig {
            prompt: String::from("% "),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        };
    }
}

/// Errors that a single input line can produce, tagged by pipeline stage.
#[derive(Debug, PartialEq)]
pub enum RunError {
    Tokenize(TokenizeError),
    Build(BuildError),
    Eval(EvalError),
}

/// Display trait implementation for RunError.
impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tokenize(tokenize_error) => {
                return write!(f, "Tokenize error: {}", tokenize_error);
            }

            Self::Build(build_error) => {
                return write!(f, "BuildTree error: {}", build_error);
            }

            Self::Eval(eval_error) => {
                return write!(f, "Evaluate error: {}", eval_error);
            }
        }
    }
}

/// Type conversions for errors.
impl From<TokenizeError> for RunError {
    fn from(value: TokenizeError) -> Self {
        return Self::Tokenize(value);
    }
}

impl From<BuildError> for RunError {
    fn from(value: BuildError) -> Self {
        return Self::Build(value);
    }
}

impl From<EvalError> for RunError {
    fn from(value: EvalError) -> Self {
        return Self::Eval(value);
    }
}

/// Runs one input line through the full pipeline against the given
/// environment.
pub fn run_line(
    line: &str,
    env: &mut Environment,
    recursion_limit: usize,
) -> Result<f64, RunError> {
    let tokens = tokenize(line)?;
    let tree = build_tree(tokens)?;
    let value = evaluate_with_limit(&tree, env, recursion_limit)?;

    return Ok(value);
}

// Whether an input line is the quit command. The final line of input may
// arrive without its trailing newline.
fn is_quit_line(line: &str) -> bool {
    return line == "quit\n" || line == "quit";
}

/// Runs the interactive loop on the given reader/writer until a `quit` line
/// or end of input. Every pipeline error is reported and the loop continues;
/// no input line is fatal and earlier bindings survive failed lines.
pub fn run_repl_on<R: BufRead, W: Write>(
    config: &ReplConfig,
    reader: &mut R,
    writer: &mut W,
) -> std::io::Result<()> {
    let mut env = Environment::new();

    loop {
        write!(writer, "{}", config.prompt)?;
        writer.flush()?;

        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 || is_quit_line(line.as_str()) {
            break;
        }

        match run_line(line.as_str(), &mut env, config.recursion_limit) {
            Ok(value) => {
                writeln!(writer, "result: {:.6}", value)?;
                writeln!(writer, "env = {}", env)?;
            }

            Err(run_error) => {
                writeln!(writer, "{}", run_error)?;
            }
        };
    }

    return Ok(());
}

/// Runs the interactive loop on standard input and output.
pub fn run_repl(config: &ReplConfig) -> std::io::Result<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();

    return run_repl_on(config, &mut stdin.lock(), &mut stdout.lock());
}
