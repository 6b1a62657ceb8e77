use std::process;

use treestatusd::{cli, serve};

fn main() {
    let options = match cli::parse_args(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!();
            cli::print_usage();
            process::exit(10);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(options.log_level)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    process::exit(serve::serve(&options));
}
