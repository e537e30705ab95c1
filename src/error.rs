//! Error handling for proxy-templater.
//! Defines the error taxonomy and result type used throughout the application.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while rendering, packaging or deploying a bundle.
#[derive(Error, Debug)]
pub enum Error {
    /// Represents errors that occur during file system operations
    #[error("IO error: {0}.")]
    IoError(#[from] io::Error),

    /// Raised when traversing a template tree fails
    #[error("Failed to walk directory: {0}.")]
    WalkError(#[from] walkdir::Error),

    /// The configuration refers to variables that are not set in the environment.
    #[error("Your configuration refers to one or more undefined environment variables: {}.", names.join(", "))]
    MissingEnvironmentVariable { names: Vec<String> },

    /// The directive delimiters cannot be turned into a reference scan.
    #[error("Invalid directive syntax: {0}.")]
    DirectiveSyntaxError(#[from] regex::Error),

    #[error("Configuration file '{path}' does not exist.")]
    ConfigNotFound { path: String },

    #[error("Failed to parse configuration '{path}': {message}.")]
    ConfigParseError { path: String, message: String },

    /// The loaded configuration lacks keys the pipeline needs.
    #[error("The configuration must specify: {}.", keys.join(", "))]
    MissingRequiredConfigKey { keys: Vec<String> },

    #[error("You must specify the {option} option.")]
    MissingRequiredCliOption { option: String },

    /// Evaluation of a template file failed.
    #[error("Failed to render template '{}': {source}.", path.display())]
    TemplateRenderError {
        path: PathBuf,
        #[source]
        source: minijinja::Error,
    },

    /// More than one file qualifies as the proxy descriptor.
    #[error("Found more than one proxy descriptor: {}.", candidates.join(", "))]
    ProxyDescriptorConflict { candidates: Vec<String> },

    /// Writing the zip archive failed. `path` is the partially written archive.
    #[error("Failed to write archive '{}': {message}.", path.display())]
    ArchiveWriteError { path: PathBuf, message: String },

    #[error("Failed to connect to the management service: {message}.")]
    RemoteConnectError { message: String, status: Option<u16> },

    #[error("Import failed: {message}.")]
    RemoteImportError { message: String, status: Option<u16> },

    #[error("Deployment to '{environment}' failed: {message}.")]
    RemoteDeployError { environment: String, message: String, status: Option<u16> },
}

/// Convenience type alias for Results with [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that reports the error and exits the program.
///
/// Prints the error message to stderr and exits with status code 1.
pub fn default_error_handler(err: Error) -> ! {
    eprintln!("while executing, error: {}", err);
    std::process::exit(1);
}
