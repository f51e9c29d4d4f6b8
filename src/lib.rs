// Library root
// -----------
// The binary (`main.rs`) parses the command line and hands it to `cli::run`.
//
// Module responsibilities:
// - `config`: the credential record and its JSON file in the home directory.
// - `api`: blocking HTTP client for the Jenkins status and validation
//   endpoints, with typed response structures.
// - `ui`: interactive configuration, spinners and result marks.
// - `cli`: subcommand parsing and the validate/test flows.
// - `error`: the error taxonomy every module returns.
// - `logging`: tracing subscriber setup.
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod ui;

pub use error::{Result, ValidatorError};
