//! CLI subcommand implementations.

pub mod alias;
pub mod export;
pub mod history;
pub mod init;
pub mod mark;
pub mod report;
pub mod status;
pub mod totp;
pub mod util;
