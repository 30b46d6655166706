use std::process::ExitCode;

fn main() -> ExitCode {
    corrubox_cli::run()
}
