//! One module per `credvault` subcommand.

pub mod add;
pub mod audit_cmd;
pub mod completions;
pub mod init;
pub mod keygen;
pub mod list;
pub mod passwd;
pub mod remove;
pub mod role;
pub mod rotate;
pub mod verify;
