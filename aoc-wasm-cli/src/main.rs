// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! AoC WASM CLI
//!
//! Command-line front end for the precompiled Advent of Code artifact.

use anyhow::{bail, Context, Result};
use aoc_wasm_loader::wasmtime::{Val, ValType};
use aoc_wasm_loader::{LoadedModule, LoaderConfig, ModuleLoader, Solver};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "aoc-wasm")]
#[command(about = "Solves Advent of Code problems with the precompiled WASM artifact", long_about = None)]
struct Cli {
    /// Loader configuration file (TOML); defaults come from AOC_WASM_* env vars
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Artifact to load instead of the configured one
    #[arg(short, long)]
    artifact: Option<PathBuf>,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the exports of the artifact
    Exports,

    /// Solve a puzzle day
    Solve {
        /// Set the year
        #[arg(short, long)]
        year: u16,

        /// Set the day to solve
        #[arg(short, long)]
        day: u8,

        /// Set the input file as problem input (stdin when omitted)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Call a numeric export
    Call {
        /// Export name
        name: String,

        /// Arguments, converted to the export's parameter types
        #[arg(allow_negative_numbers = true)]
        args: Vec<i64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => LoaderConfig::from_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => LoaderConfig::from_env(),
    };
    debug!(?config, "Loader configuration");

    let loader = ModuleLoader::with_default_bindings(config)?;
    let mut module = match &cli.artifact {
        Some(path) => loader.load_from(path),
        None => loader.load(),
    }
    .context("Failed to load artifact")?;

    match cli.command {
        Commands::Exports => print_exports(&module, cli.json),
        Commands::Solve { year, day, path } => solve(&mut module, year, day, path, cli.json),
        Commands::Call { name, args } => call(&mut module, &name, &args, cli.json),
    }
}

fn print_exports(module: &LoadedModule, json: bool) -> Result<()> {
    let exports = module.exports();
    if json {
        println!("{}", serde_json::to_string_pretty(&exports)?);
        return Ok(());
    }

    println!("{} exports from {}", exports.len(), module.artifact_path().display());
    for export in exports {
        println!("  {:<8} {}", export.kind, export.name);
    }
    Ok(())
}

fn solve(
    module: &mut LoadedModule,
    year: u16,
    day: u8,
    path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let input = read_input_data(path.as_ref()).context("Error reading input")?;

    let solution = Solver::new(module)?
        .solve_day(year, day, &input)
        .context("Error when attempting to solve day")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&solution)?);
    } else {
        println!("Solution to part 1 of day {} is: \n{}", day, solution.part_one);
        println!("Solution to part 2 of day {} is: \n{}", day, solution.part_two);
    }
    Ok(())
}

fn read_input_data(path: Option<&PathBuf>) -> std::io::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buff = String::new();
            std::io::stdin().read_to_string(&mut buff)?;
            Ok(buff)
        }
    }
}

fn call(module: &mut LoadedModule, name: &str, args: &[i64], json: bool) -> Result<()> {
    let func = module.func(name)?;
    let ty = func.ty(module.store());
    let params: Vec<ValType> = ty.params().collect();
    if params.len() != args.len() {
        bail!(
            "{} takes {} arguments, {} given",
            name,
            params.len(),
            args.len()
        );
    }

    let vals = params
        .iter()
        .zip(args)
        .map(|(ty, &arg)| to_val(ty, arg))
        .collect::<Result<Vec<_>>>()?;

    let results = module.call(name, &vals)?;
    let rendered: Vec<String> = results.iter().map(render_val).collect();

    if json {
        println!("{}", serde_json::to_string(&rendered)?);
    } else {
        println!("{}", rendered.join(" "));
    }
    Ok(())
}

fn to_val(ty: &ValType, arg: i64) -> Result<Val> {
    Ok(match ty {
        ValType::I32 => Val::I32(
            i32::try_from(arg).with_context(|| format!("{arg} does not fit in i32"))?,
        ),
        ValType::I64 => Val::I64(arg),
        ValType::F32 => Val::F32((arg as f32).to_bits()),
        ValType::F64 => Val::F64((arg as f64).to_bits()),
        other => bail!("unsupported parameter type {other:?}"),
    })
}

fn render_val(val: &Val) -> String {
    match val {
        Val::I32(v) => v.to_string(),
        Val::I64(v) => v.to_string(),
        Val::F32(bits) => f32::from_bits(*bits).to_string(),
        Val::F64(bits) => f64::from_bits(*bits).to_string(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_solve() {
        let cli = Cli::try_parse_from(["aoc-wasm", "solve", "-y", "2019", "-d", "2"]).unwrap();
        match cli.command {
            Commands::Solve { year, day, path } => {
                assert_eq!(year, 2019);
                assert_eq!(day, 2);
                assert!(path.is_none());
            }
            _ => panic!("expected solve"),
        }
    }

    #[test]
    fn test_parse_call_with_negative_args() {
        let cli = Cli::try_parse_from(["aoc-wasm", "--json", "call", "add", "-3", "8"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Call { name, args } => {
                assert_eq!(name, "add");
                assert_eq!(args, vec![-3, 8]);
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn test_to_val_conversions() {
        assert!(matches!(to_val(&ValType::I32, 7).unwrap(), Val::I32(7)));
        assert!(matches!(to_val(&ValType::I64, -1).unwrap(), Val::I64(-1)));
        assert!(to_val(&ValType::I32, i64::MAX).is_err());
        assert_eq!(render_val(&to_val(&ValType::F64, 2).unwrap()), "2");
    }
}
