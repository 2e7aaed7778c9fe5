use clap::Parser;

use cfs::cli::{self, Cli};

fn main() {
    let cli = Cli::parse();
    cfs::init_logging(cli.debug());

    if let Err(e) = cli::run(&cli) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
