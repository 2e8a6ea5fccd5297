use std::process::ExitCode;

fn main() -> ExitCode {
    chatrelay_cli::run()
}
