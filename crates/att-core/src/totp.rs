//! Time-based one-time passwords (HMAC-SHA1, 6 digits, 30 second steps).
//!
//! Codes are derived the RFC 6238 way: the Unix time is divided into
//! 30-second steps, the step counter is MACed with the shared secret, and
//! the MAC is reduced to six decimal digits by dynamic truncation.
//! Verification tolerates one step of clock skew in either direction.
//!
//! Verification does not remember codes it has accepted. A code stays
//! usable for every check made within the tolerated window.

use std::fmt;

use chrono::{DateTime, Utc};
use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand_core::{OsRng, RngCore};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

type HmacSha1 = Hmac<Sha1>;

/// Number of digits in a code.
pub const DIGITS: usize = 6;

/// Length of one time step in seconds.
pub const PERIOD_SECS: i64 = 30;

/// Smallest accepted secret, in bytes after decoding.
pub const MIN_SECRET_BYTES: usize = 16;

const GENERATED_SECRET_BYTES: usize = 20;
const CODE_MODULUS: u32 = 1_000_000;
const SKEW_STEPS: i64 = 1;

/// Characters left unescaped in key URI labels and parameters.
const URI_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Errors from parsing a shared secret.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecretError {
    #[error("secret is not valid base32")]
    InvalidEncoding,
    #[error("secret must decode to at least {MIN_SECRET_BYTES} bytes, got {len}")]
    TooShort { len: usize },
}

/// Shared secret used to derive codes. Zeroized on drop.
#[derive(Clone)]
pub struct Secret(Zeroizing<Vec<u8>>);

impl Secret {
    /// Parses the base32 text form.
    ///
    /// Lowercase letters, whitespace and `=` padding are accepted so that
    /// secrets copied from authenticator apps parse as-is.
    pub fn from_base32(encoded: &str) -> Result<Self, SecretError> {
        let normalized: String = encoded
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '=')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        let bytes = BASE32_NOPAD
            .decode(normalized.as_bytes())
            .map_err(|_| SecretError::InvalidEncoding)?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SecretError> {
        let bytes = Zeroizing::new(bytes);
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(SecretError::TooShort { len: bytes.len() });
        }
        Ok(Self(bytes))
    }

    /// Generates a fresh 160-bit secret from the operating system RNG.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new(vec![0u8; GENERATED_SECRET_BYTES]);
        OsRng.fill_bytes(bytes.as_mut_slice());
        Self(bytes)
    }

    /// Unpadded base32, the form authenticator apps expect.
    pub fn to_base32(&self) -> String {
        BASE32_NOPAD.encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("len", &self.0.len())
            .finish_non_exhaustive()
    }
}

/// Time step counter containing `at`.
pub fn time_step(at: DateTime<Utc>) -> i64 {
    at.timestamp().div_euclid(PERIOD_SECS)
}

/// Derives the code valid during the time step containing `at`.
pub fn derive(secret: &Secret, at: DateTime<Utc>) -> String {
    code_for_step(secret, time_step(at))
}

/// Checks `candidate` against the current step and one step either side.
///
/// Malformed candidates are rejected without deriving anything.
pub fn verify(secret: &Secret, candidate: &str, now: DateTime<Utc>) -> bool {
    let Some(candidate) = normalize_code(candidate) else {
        return false;
    };
    let step = time_step(now);
    (-SKEW_STEPS..=SKEW_STEPS).any(|offset| {
        let expected = code_for_step(secret, step + offset);
        expected.as_bytes().ct_eq(candidate.as_bytes()).into()
    })
}

/// Strips whitespace and returns the code if exactly six ASCII digits remain.
pub fn normalize_code(candidate: &str) -> Option<String> {
    let code: String = candidate.chars().filter(|c| !c.is_whitespace()).collect();
    (code.len() == DIGITS && code.bytes().all(|b| b.is_ascii_digit())).then_some(code)
}

/// Seconds until the code for `now` rolls over, in `1..=30`.
pub fn time_remaining(now: DateTime<Utc>) -> i64 {
    PERIOD_SECS - now.timestamp().rem_euclid(PERIOD_SECS)
}

/// Builds an `otpauth://` provisioning URI for authenticator apps.
pub fn key_uri(secret: &Secret, account: &str, issuer: &str) -> String {
    let issuer = utf8_percent_encode(issuer, URI_SAFE).to_string();
    let account = utf8_percent_encode(account, URI_SAFE);
    format!(
        "otpauth://totp/{issuer}:{account}?secret={}&issuer={issuer}&algorithm=SHA1&digits={DIGITS}&period={PERIOD_SECS}",
        secret.to_base32()
    )
}

#[expect(
    clippy::cast_sign_loss,
    reason = "pre-epoch steps wrap like any other 64-bit counter"
)]
fn code_for_step(secret: &Secret, step: i64) -> String {
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(&(step as u64).to_be_bytes());
    let hash = mac.finalize().into_bytes();

    let offset = usize::from(hash[hash.len() - 1] & 0x0f);
    let word = u32::from_be_bytes([
        hash[offset],
        hash[offset + 1],
        hash[offset + 2],
        hash[offset + 3],
    ]) & 0x7fff_ffff;

    format!("{:0width$}", word % CODE_MODULUS, width = DIGITS)
}
