// ai
//! 🚀 ack-cli: the front door. One config file in, one summary table out.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 Loads config, sets up logging, then lets the library do the heavy lifting.
//! Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// 🪣 Read the newest object per group out of a bucket and hand its records to writers.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file. `ACK_*` env vars are merged underneath it.
    #[arg(default_value = "ack.toml")]
    config: PathBuf,
}

/// 🔌 Substrings that smell like "the other end never picked up".
const CONNECTION_SMELLS: [&str; 6] = [
    "error sending request",
    "connection refused",
    "Connection refused",
    "tcp connect error",
    "dns error",
    "dispatch failure",
];

/// 🚀 main(): init tracing, parse args, load config, run, print the table. Or print the tears.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // 🔒 A missing file is not an error by itself: env vars alone may carry the whole config.
    let config_file = args.config.as_path();
    let config_file_that_exists = match config_file.try_exists().with_context(|| {
        format!(
            "💀 Could not check whether the configuration file exists. If it is a relative path, \
             it is relative to the current directory. Was checking here: '{}'",
            config_file.display()
        )
    })? {
        true => Some(config_file),
        false => None,
    };

    let app_config = ack::app_config::load_config(config_file_that_exists)
        .context("💀 In ack-cli, main, we couldn't load the config. Take a look at the file and the ACK_* env vars.")?;

    match ack::run(app_config).await {
        Ok(summary) => {
            eprintln!("{}", summary);
            if summary.failed() > 0 {
                error!("⚠️  {} stream(s) failed and were skipped", summary.failed());
            }
            Ok(())
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion, one layer at a time
            let mut smells_like_connection_trouble = false;
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
                let cause_str = cause.to_string();
                if CONNECTION_SMELLS.iter().any(|smell| cause_str.contains(smell)) {
                    smells_like_connection_trouble = true;
                }
            }

            if smells_like_connection_trouble {
                error!(
                    "🔧 hint: the storage endpoint isn't reachable. Check the region or endpoint \
                     in the reader config, your network, and for S3-compatible stores (MinIO, \
                     LocalStack) that the container is actually running: `docker ps`. ☕"
                );
            }

            std::process::exit(1);
        }
    }
}
