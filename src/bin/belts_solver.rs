//! Standalone belts-solver executable: reads one JSON problem document
//! from stdin, writes one JSON response document to stdout.

use std::io::{self, Read, Write};

use color_eyre::eyre::{Result, WrapErr};
use factory_planner::belts::{solve_belts, BeltsInput};
use log::info;

fn main() -> Result<()> {
    if std::env::var("RUST_BACKTRACE").is_err() {
        std::env::set_var("RUST_BACKTRACE", "1");
    }
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let mut raw = String::new();
    io::stdin()
        .read_to_string(&mut raw)
        .wrap_err("failed to read problem from stdin")?;

    let input: BeltsInput =
        serde_json::from_str(&raw).wrap_err("failed to parse belts problem JSON")?;

    let output = solve_belts(&input)?;

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &output).wrap_err("failed to serialize belts response")?;
    stdout.write_all(b"\n")?;

    info!("belts solve complete");
    Ok(())
}
