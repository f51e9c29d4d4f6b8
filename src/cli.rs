// Command surface: `config`, `validate <path>` and `test`.
// Each subcommand maps onto one flow below; the flows print their results to
// the writer they are given and return a typed error on any failure.

use crate::api::{ClientOptions, JenkinsClient, Verdict, DEFAULT_ERROR_BODY_LIMIT};
use crate::config::ConfigStore;
use crate::error::{Result, ValidatorError};
use crate::ui::{self, TerminalPrompter};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "jenkinsfile-validator",
    version,
    about = "Validates Jenkinsfile",
    long_about = "Connects to a Jenkins instance and validates whether a Jenkinsfile is valid"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Bytes of an error response body to include in failure messages
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_ERROR_BODY_LIMIT, global = true)]
    pub error_body_limit: usize,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Set the Jenkins URL, username and API token
    Config,
    /// Validate a Jenkinsfile against the configured server
    Validate {
        /// Path to the Jenkinsfile
        file: PathBuf,
    },
    /// Test the connection to Jenkins using the configured credentials
    Test,
}

impl Cli {
    /// Client tunables taken from the global flags.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            error_body_limit: self.error_body_limit,
        }
    }
}

/// Dispatch the parsed command line.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let options = cli.client_options();
    let store = ConfigStore::default_location()?;
    tracing::debug!(path = %store.path().display(), "using config file");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Commands::Config => ui::configure(&store, &mut TerminalPrompter::new(), &mut out)?,
        Commands::Validate { file } => validate_file(&file, &store, options, &mut out)?,
        Commands::Test => test_connection(&store, options, &mut out)?,
    }
    Ok(())
}

/// Read `path`, submit it to the server and report the verdict. An invalid
/// Jenkinsfile ends in [`ValidatorError::ValidationFailed`] after its errors
/// have been printed.
pub fn validate_file(
    path: &Path,
    store: &ConfigStore,
    options: ClientOptions,
    out: &mut dyn Write,
) -> Result<()> {
    let bytes = fs::read(path).map_err(|source| ValidatorError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let creds = store.load()?;
    let client = JenkinsClient::new(&creds, options)?;

    let pb = ui::spinner("Validating Jenkinsfile...");
    let verdict = client.validate(&bytes);
    pb.finish_and_clear();

    match verdict? {
        Verdict::Valid => {
            writeln!(out, "{} Jenkinsfile is valid", ui::success_mark())
                .map_err(ValidatorError::Terminal)?;
            Ok(())
        }
        Verdict::Invalid(messages) => {
            print_failures(&messages, out).map_err(ValidatorError::Terminal)?;
            Err(ValidatorError::ValidationFailed {
                reported: messages.len(),
            })
        }
    }
}

fn print_failures(messages: &[String], out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{} Jenkinsfile validation failed", ui::failure_mark())?;
    if !messages.is_empty() {
        writeln!(out, "\nErrors:")?;
        for message in messages {
            writeln!(out, "- {message}")?;
        }
    }
    Ok(())
}

/// Probe `/api/json` with the stored credentials and print what the server
/// reports about itself.
pub fn test_connection(store: &ConfigStore, options: ClientOptions, out: &mut dyn Write) -> Result<()> {
    let creds = store.load()?;
    let client = JenkinsClient::new(&creds, options)?;

    writeln!(out, "Testing connection to Jenkins...").map_err(ValidatorError::Terminal)?;
    writeln!(out, "Jenkins URL: {}", client.base_url()).map_err(ValidatorError::Terminal)?;
    writeln!(out, "Username: {}", creds.username).map_err(ValidatorError::Terminal)?;

    let pb = ui::spinner("Connecting...");
    let info = client.test_connection();
    pb.finish_and_clear();
    let info = info?;

    writeln!(out, "\nConnection successful!").map_err(ValidatorError::Terminal)?;
    if let Some(node) = &info.node_name {
        writeln!(out, "Connected to Jenkins node: {node}").map_err(ValidatorError::Terminal)?;
    }
    if let Some(mode) = &info.mode {
        writeln!(out, "Jenkins mode: {mode}").map_err(ValidatorError::Terminal)?;
    }
    Ok(())
}
