use std::io::Read;

use anyhow::Context;

use rvlower::cli::Cli;
use rvlower::ir::parser;
use rvlower::lower;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let source = match &cli.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            buf
        }
    };

    let program = parser::parse(&source)?;
    log::debug!(
        "parsed {} functions, lowering with {} registers",
        program.functions.len(),
        cli.registers
    );
    let lowered = lower::lower_program(&program, cli.registers)?;

    print!("{lowered}");
    Ok(())
}
