pub mod assembler;
pub mod compiler;
pub mod config;
pub mod env_vars;
pub mod exporter;
pub mod processors;
pub mod profile;
pub mod receivers;
pub mod resolver;
pub mod status;
pub mod validation;

pub use compiler::*;
pub use env_vars::*;
pub use profile::*;
pub use resolver::*;
pub use status::*;

/// Env vars the collector runtime provides itself. They appear as
/// placeholders in the document but never in the compiled env-var map.
pub const POD_IP_ENV_VAR: &str = "MY_POD_IP";
pub const NODE_NAME_ENV_VAR: &str = "MY_NODE_NAME";
pub const RUNTIME_ENV_VARS: [&str; 3] = [POD_IP_ENV_VAR, NODE_NAME_ENV_VAR, "KUBERNETES_SERVICE_HOST"];
