use anyhow::Result;
use log::LevelFilter;

use hydra_cli::cli::build_cli;
use hydra_cli::{classify, multiscale};

fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let verbose = matches
        .subcommand()
        .map(|(_, sub)| sub.get_flag("verbose"))
        .unwrap_or(false);
    let default_filter = if verbose {
        "error,hydra=debug"
    } else {
        "error,hydra=info"
    };
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("HYDRA_LOG", default_filter))
        .init();

    match matches.subcommand() {
        Some(("classify", sub_m)) => {
            if let Err(e) = classify::run(sub_m) {
                log::error!("Classification failed: {:#}", e);
                std::process::exit(1)
            }
        }
        Some(("multiscale", sub_m)) => {
            if let Err(e) = multiscale::run(sub_m) {
                log::error!("Multi-scale classification failed: {:#}", e);
                std::process::exit(1)
            }
        }
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
    Ok(())
}
