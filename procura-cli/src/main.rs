//! Entry point for the `procura` command-line interface.
#![forbid(unsafe_code)]

fn main() {
    procura_cli::init_logging();
    if let Err(err) = procura_cli::run() {
        eprintln!("procura: {err}");
        std::process::exit(1);
    }
}
