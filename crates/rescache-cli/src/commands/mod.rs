//! CLI command handlers

pub mod init;
pub mod ls;
pub mod status;
pub mod storage;
pub mod sync;

use serde::Serialize;

/// Print a value as pretty JSON
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
