//! Standalone factory-solver executable: reads one JSON problem document
//! from stdin, writes one JSON response document to stdout.

use std::io::{self, Read, Write};

use color_eyre::eyre::{Result, WrapErr};
use factory_planner::factory::{solve_factory, FactoryInput};
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

    let input: FactoryInput =
        serde_json::from_str(&raw).wrap_err("failed to parse factory problem JSON")?;

    let output = solve_factory(&input)?;

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &output).wrap_err("failed to serialize factory response")?;
    stdout.write_all(b"\n")?;

    info!("factory solve complete");
    Ok(())
}
