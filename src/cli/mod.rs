use std::path::PathBuf;

use clap::Parser;

use crate::regalloc::{CALLEE_SAVED, CALLER_SAVED};

#[derive(Parser)]
#[command(name = "rvlower")]
#[command(about = "Allocates registers for a three-address IR and lowers it to register form")]
pub struct Cli {
    /// IR source file; reads stdin when omitted.
    pub input: Option<PathBuf>,

    /// Number of general-purpose registers available to the allocator.
    #[clap(short, long, default_value_t = CALLER_SAVED.len() + CALLEE_SAVED.len())]
    pub registers: usize,
}

impl Cli {
    pub fn parse() -> Self {
        Parser::parse()
    }
}
