use std::process::ExitCode;

fn main() -> ExitCode {
    provy_cli::run()
}
