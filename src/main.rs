// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::process;

use clap::Parser;

use pose_demo::cli::args::Cli;
use pose_demo::cli::demo::run_demo;
use pose_demo::error;

fn main() {
    let args = Cli::parse();

    if let Err(e) = run_demo(&args) {
        error!("{e}");
        process::exit(1);
    }
}
