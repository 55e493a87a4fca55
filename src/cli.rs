// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command line options, logger setup and config directory resolution.

use std::path::{Path, PathBuf};

use anyhow::Context;
use directories_next::ProjectDirs;
use structopt::StructOpt;

use crate::config::AuracleConfig;

/// Package identifier, where the default configuration & database are defined.
/// If the user does not start the node with the `--config-dir`
/// it will default to read from the default location depending on the OS.
pub const PACKAGE_ID: [&str; 3] = ["xyz", "auracle", "auracle-node"];

/// The Auracle Command-line tool
///
/// Serve sensor metadata and the live sensor list:
///
/// $ auracle -vvv -c <CONFIG_DIR> serve
#[derive(Debug, StructOpt)]
#[structopt(name = "Auracle Node")]
pub struct Opts {
    /// A level of verbosity, and can be used multiple times
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: i32,
    /// Directory that contains configration files.
    #[structopt(
        short = "c",
        long = "config-dir",
        value_name = "PATH",
        parse(from_os_str)
    )]
    pub config_dir: Option<PathBuf>,
    /// What to do.
    #[structopt(subcommand)]
    pub command: Command,
}

/// The node's commands.
#[derive(Debug, StructOpt)]
pub enum Command {
    /// Serve token metadata and the live sensor list over HTTP.
    Serve,
    /// Print a one-shot snapshot of every registered sensor as JSON.
    Sensors,
    /// Register a new sensor owned by the configured signer.
    Register {
        /// Latitude in degrees, -90 to 90.
        #[structopt(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude in degrees, -180 to 180.
        #[structopt(long, allow_hyphen_values = true)]
        lng: f64,
    },
    /// Periodically submit random readings for the signer's first sensor.
    Simulate,
    /// Point the token metadata at a new base URI (contract owner only).
    SetBaseUri {
        /// The new base URI. Defaults to `metadata.base-uri` from the config.
        #[structopt(long)]
        uri: Option<String>,
    },
}

/// Loads the configuration from the given directory.
///
/// Falls back to the OS specific config directory of the node.
pub fn load_config<P>(config_dir: Option<P>) -> anyhow::Result<AuracleConfig>
where
    P: AsRef<Path>,
{
    tracing::debug!("Getting default dirs for auracle node");
    let dirs = ProjectDirs::from(PACKAGE_ID[0], PACKAGE_ID[1], PACKAGE_ID[2])
        .context("failed to get config")?;
    let path = match config_dir {
        Some(p) => p.as_ref().to_path_buf(),
        None => dirs.config_dir().to_path_buf(),
    };
    // return an error if the path is not a directory.
    if !path.is_dir() {
        return Err(anyhow::anyhow!("{} is not a directory", path.display()));
    }
    tracing::trace!("Loading Config from {} ..", path.display());
    let v = crate::config::load(path)?;
    tracing::trace!("Config loaded..");
    Ok(v)
}

/// Sets up the logger for the node, based on the verbosity level passed in.
///
/// `0` only shows errors, every extra `-v` shows one more level down to
/// `TRACE`. Directives in `RUST_LOG` are merged in.
pub fn setup_logger(verbosity: i32) -> anyhow::Result<()> {
    use tracing::Level;
    use tracing_subscriber::filter::Directive;
    let log_level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let directive_1 = format!("auracle_node={}", log_level)
        .parse::<Directive>()
        .context("valid log level")?;
    let directive_2 = format!("{}={}", crate::probe::TARGET, log_level)
        .parse::<Directive>()
        .context("valid log level")?;
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(directive_1)
        .add_directive(directive_2);
    let logger = tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(log_level)
        .with_env_filter(env_filter);
    // if we are not compiling for integration tests, we should use pretty logs
    #[cfg(not(feature = "integration-tests"))]
    let logger = logger.pretty();
    // otherwise, we should use json, which is easy to parse.
    #[cfg(feature = "integration-tests")]
    let logger = logger.json().flatten_event(true).with_current_span(false);

    logger.init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let opts = Opts::from_iter(["auracle", "-vv", "-c", "/tmp/cfg", "serve"]);
        assert_eq!(opts.verbose, 2);
        assert_eq!(opts.config_dir, Some(PathBuf::from("/tmp/cfg")));
        assert!(matches!(opts.command, Command::Serve));

        let opts = Opts::from_iter([
            "auracle", "register", "--lat", "-6.2088", "--lng", "106.8456",
        ]);
        match opts.command {
            Command::Register { lat, lng } => {
                assert_eq!(lat, -6.2088);
                assert_eq!(lng, 106.8456);
            }
            other => panic!("unexpected {other:?}"),
        }

        let opts = Opts::from_iter(["auracle", "set-base-uri"]);
        assert!(matches!(opts.command, Command::SetBaseUri { uri: None }));
    }

    #[test]
    fn missing_config_dir_is_an_error() {
        let err = load_config(Some("/definitely/not/here")).unwrap_err();
        assert!(err.to_string().contains("is not a directory"));
    }
}
