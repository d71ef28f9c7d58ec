//! Run the interactive arithmetic evaluator on standard input.
//!
//! Example session:
//!
//!     % (n=2)
//!     result: 2.000000
//!     env = {n: Num(2.000000)}
//!     % (1+n)
//!     result: 3.000000
//!     env = {n: Num(2.000000)}
//!     % quit

use clap::Parser;
use rust_paren_calc::end_to_end::{run_repl, ReplConfig};

fn main() {
    let repl_config = ReplConfig::parse();

    if let Err(io_error) = run_repl(&repl_config) {
        println!("Input error: {}", io_error);
    }
}
