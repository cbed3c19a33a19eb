mod library;

use std::process;

use library::cli::run;

fn main() {
    process::exit(run());
}
