//! ghr binary entry point.

use ghr::cli::{self, CliError};

fn main() {
    let Err(err) = cli::run() else {
        return;
    };

    let code = match err.downcast_ref::<CliError>() {
        Some(CliError::Flag(message)) => {
            eprintln!("{message}");
            eprintln!();
            eprintln!("Run 'ghr --help' for usage.");
            1
        }
        Some(cli_error) => cli_error.exit_code(),
        None => {
            eprintln!("{err}");
            1
        }
    };
    std::process::exit(code);
}
