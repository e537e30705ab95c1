//! proxy-templater renders API proxy templates against a configuration,
//! then packages the result as a zip archive or imports and deploys it
//! through the Apigee management API.

/// Bundle archives and asset kinds
pub mod archive;

/// Command-line interface module
pub mod cli;

/// Management API client (connect, import, deploy)
pub mod client;

/// Configuration loading with environment variable expansion
pub mod config;

/// Common constants
pub mod constants;

/// Error types and handling
pub mod error;

/// File skip patterns for template trees
pub mod ignore;

pub mod logger;

/// Generation and deployment orchestration
pub mod pipeline;

/// Working tree materialization
pub mod processor;

/// Template directive translation and rendering
pub mod renderer;
