use std::process::ExitCode;

fn main() -> ExitCode {
    zpdb_cli::init_logging();
    zpdb_cli::run_main(std::env::args_os().collect())
}
