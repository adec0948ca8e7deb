use std::process::ExitCode;

fn main() -> ExitCode {
    soldy_cli::run()
}
