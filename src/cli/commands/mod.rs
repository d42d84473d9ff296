//! Command implementations, one module per subcommand.

#[cfg(feature = "audit-log")]
pub mod audit_cmd;
pub mod delete;
pub mod get;
pub mod history;
pub mod keygen;
pub mod list;
pub mod rotate;
pub mod set;
pub mod update;
pub mod validate;
