//! Common constants used throughout proxy-templater.

/// Keys every configuration must define before generation starts
pub const REQUIRED_CONFIG_KEYS: [&str; 2] = ["proxyname", "basepath"];

/// File name patterns that are never copied into the working tree:
/// editor backups and disabled files.
pub const SKIP_PATTERNS: [&str; 2] = ["*~", "#*"];

/// Suffix stripped from the source directory name to form the template name
pub const TEMPLATE_SUFFIX: &str = "-template";

/// Directory holding the proxy descriptor of an API proxy bundle
pub const APIPROXY_DIR: &str = "apiproxy";

/// Top-level directory of a shared flow bundle
pub const SHAREDFLOW_DIR: &str = "sharedflowbundle";

/// Name of the working tree directory inside the scoped temporary directory
pub const WORKING_TREE_DIR: &str = "bundle";

/// strftime pattern of the archive timestamp, e.g. `2024Jun07T123331`
pub const TIMESTAMP_FORMAT: &str = "%Y%b%dT%H%M%S";

pub const DEFAULT_API_HOST: &str = "https://apigee.googleapis.com";
