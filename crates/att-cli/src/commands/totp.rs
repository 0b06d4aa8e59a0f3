//! Secret provisioning and current-code display.

use std::io::Write;

use anyhow::Result;
use att_core::Secret;
use att_core::totp;
use chrono::{DateTime, Utc};

/// Generates a fresh secret and prints how to provision it.
pub fn new<W: Write>(
    writer: &mut W,
    issuer: &str,
    account: &str,
    now: DateTime<Utc>,
) -> Result<Secret> {
    let secret = Secret::generate();
    writeln!(writer, "Secret:  {}", secret.to_base32())?;
    writeln!(writer, "URI:     {}", totp::key_uri(&secret, account, issuer))?;
    print_code(writer, &secret, now)?;
    writeln!(writer)?;
    writeln!(
        writer,
        "Set totp_secret in the config file or ATT_TOTP_SECRET to use it."
    )?;
    Ok(secret)
}

/// Prints the current code for `secret`.
pub fn show<W: Write>(writer: &mut W, secret: &Secret, now: DateTime<Utc>) -> Result<()> {
    print_code(writer, secret, now)
}

fn print_code<W: Write>(writer: &mut W, secret: &Secret, now: DateTime<Utc>) -> Result<()> {
    writeln!(writer, "Code:    {}", totp::derive(secret, now))?;
    writeln!(writer, "Expires: {}s", totp::time_remaining(now))?;
    Ok(())
}
