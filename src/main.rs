use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, LevelFilter};

use songvault::app_bootstrap::{bootstrap, init_logging};
use songvault::backends::credential_keyring;
use songvault::cli::{join_keyword, Cli, Commands};
use songvault::config::{self, Config, ConfigError};
use songvault::delivery::RequestHandler;
use songvault::worker_pool::WorkerPool;

fn load_config(path: Option<PathBuf>) -> Result<(PathBuf, Config), ConfigError> {
    let path = match path {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    let config = config::load_or_create(&path)?;
    Ok((path, config))
}

fn serve(handler: Arc<RequestHandler>, threads: usize) -> Result<(), Box<dyn std::error::Error>> {
    let pool = WorkerPool::new(threads)?;
    info!("Serve: reading keywords from stdin on {threads} worker(s)");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let keyword = line?;
        if keyword.trim().is_empty() {
            continue;
        }
        let handler = Arc::clone(&handler);
        if !pool.execute(move || println!("{}", handler.handle(&keyword))) {
            error!("Serve: worker pool stopped accepting requests");
            break;
        }
    }

    pool.join();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loaded = load_config(cli.config.clone());
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        loaded
            .as_ref()
            .map(|(_, config)| config.general.log_level.into())
            .unwrap_or(LevelFilter::Info)
    };
    init_logging(level);

    let (config_path, config) = match loaded {
        Ok(loaded) => loaded,
        Err(err) => {
            error!("Bootstrap: cannot load config: {err}");
            std::process::exit(1);
        }
    };
    info!("Bootstrap: loaded config from {}", config_path.display());

    if let Commands::SetCredential { token } = &cli.command {
        credential_keyring::set_session_token(token.trim())?;
        println!("session token stored in the system keyring");
        return Ok(());
    }

    let handler = match bootstrap(&config) {
        Ok(handler) => handler,
        Err(err) => {
            error!("Bootstrap: {err}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Resolve { keyword } => {
            let keyword = join_keyword(&keyword);
            match handler.resolver().resolve(&keyword)? {
                Some(song) => {
                    let source = if song.is_cached() {
                        "cache"
                    } else {
                        song.url.as_deref().unwrap_or_default()
                    };
                    println!(
                        "{} - {} [{}] #{} ({}) from {}",
                        song.name, song.artist, song.album, song.id, song.format, source
                    );
                }
                None => println!("\"{keyword}\" not found"),
            }
        }
        Commands::Fetch { keyword } => {
            println!("{}", handler.handle(&join_keyword(&keyword)));
        }
        Commands::Serve => serve(handler, config.general.threads)?,
        Commands::SetCredential { .. } => {}
    }

    Ok(())
}
