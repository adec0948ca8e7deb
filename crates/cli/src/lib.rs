pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::calc::CalcMethod;

#[derive(Debug, Parser)]
#[command(
    name = "soldy",
    about = "Soldy operator CLI",
    long_about = "Inspect configuration, check readiness, and run the heating calculator and product recommender offline.",
    after_help = "Examples:\n  soldy doctor --json\n  soldy calc area --m2 80 --zone centro --insulation buena\n  soldy recommend '{\"kind\":\"floor_heating\",\"area_m2\":80}'"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, catalog loading and text generation readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
        #[arg(long, help = "Send a one-line prompt to the configured model")]
        live: bool,
    },
    #[command(about = "Run a heat load calculation")]
    Calc {
        #[command(subcommand)]
        method: CalcMethod,
    },
    #[command(about = "Recommend products for a JSON recommendation request")]
    Recommend {
        #[arg(help = "Request such as {\"kind\":\"boiler_by_area\",\"area_m2\":120}")]
        request: String,
        #[arg(long, help = "Return up to three alternatives instead of a single pick")]
        options: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json, live } => commands::doctor::run(json, live),
        Command::Calc { method } => commands::calc::run(&method),
        Command::Recommend { request, options } => commands::recommend::run(&request, options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
