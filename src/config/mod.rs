//! Configuration: `credvault.toml` settings and credential-path resolution.

pub mod settings;

pub use settings::{resolve_path, Settings, ROOT_TOKEN};
