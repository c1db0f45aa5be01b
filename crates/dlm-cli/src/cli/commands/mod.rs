//! CLI command handlers, one file per subcommand.

mod get;
mod shell;

pub use get::run_get;
pub use shell::run_shell;
