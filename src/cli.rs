//! Command-line interface implementation for proxy-templater.
//! Provides argument parsing, validation and help text formatting using clap.

use clap::{error::ErrorKind, CommandFactory, Parser};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::client::ConnectOptions;
use crate::constants::DEFAULT_API_HOST;
use crate::error::{Error, Result};
use crate::pipeline::{DeploySettings, Mode};

/// Command-line arguments structure for proxy-templater.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Generate an API proxy from a template, then package or import and deploy it",
    long_about = None
)]
pub struct Args {
    /// Source directory for the proxy template files.
    /// It should have a child directory "apiproxy" or "sharedflowbundle".
    #[arg(short = 'd', long, value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// The configuration data for the template
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Expand a single template file against the configuration and print it
    #[arg(long, value_name = "FILE", conflicts_with_all = ["source", "generateonly"])]
    pub templatefile: Option<PathBuf>,

    /// Environment(s) to deploy to. Separate multiple environments with a comma.
    #[arg(short, long, env = "ENV", value_name = "NAME[,NAME...]")]
    pub env: Option<String>,

    /// The service account to use at deployment time
    #[arg(long, value_name = "ID")]
    pub serviceaccount: Option<String>,

    /// Write a zip archive instead of importing into the management service
    #[arg(long)]
    pub generateonly: bool,

    /// Directory where the generated archive is written
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub outdir: PathBuf,

    /// Organization to import into
    #[arg(short, long, env = "ORG")]
    pub org: Option<String>,

    /// Bearer token for the management API
    #[arg(long, env = "APIGEE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Base URL of the management API
    #[arg(long, env = "APIGEE_HOST", default_value = DEFAULT_API_HOST)]
    pub apihost: Url,

    /// Timeout in seconds for each management API request
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated arguments of one run.
#[derive(Debug)]
pub struct Invocation {
    /// Template source tree, or the template file in [`Mode::Expand`]
    pub source: PathBuf,
    pub config: PathBuf,
    pub mode: Mode,
}

fn required<T>(value: Option<T>, option: &str) -> Result<T> {
    value.ok_or_else(|| Error::MissingRequiredCliOption { option: option.to_string() })
}

/// Splits a comma separated environment list, dropping blank entries.
pub fn split_environments(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

impl Args {
    /// Checks the options required by the selected mode.
    ///
    /// # Errors
    /// * `Error::MissingRequiredCliOption` naming the first missing option,
    ///   checked in the order `--source`, `--config`, then for deploy mode
    ///   `--serviceaccount`, `--org`, `--token`. With `--templatefile` only
    ///   `--config` is required.
    pub fn into_invocation(self) -> Result<Invocation> {
        if let Some(template_file) = self.templatefile {
            let config = required(self.config, "--config")?;
            return Ok(Invocation { source: template_file, config, mode: Mode::Expand });
        }

        let source = required(self.source, "--source")?;
        let config = required(self.config, "--config")?;

        let mode = if self.generateonly {
            Mode::Generate { out_dir: self.outdir }
        } else {
            let service_account = required(self.serviceaccount, "--serviceaccount")?;
            let org = required(self.org, "--org")?;
            let token = required(self.token, "--token")?;
            Mode::Deploy(DeploySettings {
                environments: self.env.as_deref().map(split_environments).unwrap_or_default(),
                service_account,
                connect: ConnectOptions {
                    api_host: self.apihost,
                    org,
                    token,
                    timeout: self.timeout.map(Duration::from_secs),
                },
            })
        };

        Ok(Invocation { source, config, mode })
    }
}

/// Prints the option descriptions.
pub fn print_usage() {
    let _ = Args::command()
        .help_template(
            r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#,
        )
        .print_help();
}

/// Parses command line arguments and returns the Args structure.
///
/// # Exits
/// * With status code 1 if required arguments are missing
/// * With clap's default error handling for other argument errors
pub fn get_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if e.kind() == ErrorKind::MissingRequiredArgument {
                print_usage();
                std::process::exit(1);
            } else {
                e.exit();
            }
        }
    }
}
