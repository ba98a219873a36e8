use std::process::ExitCode;

fn main() -> ExitCode {
    alldocs_lib::run()
}
