//! Alias command for setting a user's display name.

use std::io::Write;

use anyhow::Result;
use att_core::{Alias, AttendanceStore, UserId, set_alias};

use super::util;

pub fn run<W: Write, S: AttendanceStore>(
    writer: &mut W,
    store: &S,
    user_id: UserId,
    first: &str,
    last: &[String],
) -> Result<Alias> {
    let last = last.join(" ");
    let name = util::person_name(first, Some(&last))?;
    let alias = set_alias(store, user_id, name)?;
    writeln!(writer, "Alias for user {user_id} set to {}.", alias.name)?;
    Ok(alias)
}
