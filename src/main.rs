use clap::Parser;

use aigsynt::cmd::{run, Cli};

fn main() {
    let cli = Cli::parse();
    let filter = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
