//! Certificate serial canonicalization.
//!
//! The proxy forwards serials either bare (`1a2b3c`) or already delimited
//! (`1a:2b:3c`, `1a-2b-3c`). The Secret Store addresses certificates by the
//! colon-delimited form.

use super::{IdentityError, Result};

/// Canonicalize a certificate serial.
///
/// Delimited input is returned unchanged once every non-delimiter character is
/// confirmed to be a hex digit. Bare input must be non-empty, hex and of even
/// length; it is split into byte pairs joined by `:`.
pub fn normalize_serial(raw: &str) -> Result<String> {
    if raw.contains(':') || raw.contains('-') {
        if let Some(bad) = raw.chars().find(|c| !c.is_ascii_hexdigit() && *c != ':' && *c != '-')
        {
            return Err(IdentityError::malformed_serial(
                raw,
                format!("unexpected character '{}'", bad.escape_default()),
            ));
        }
        return Ok(raw.to_string());
    }

    if raw.is_empty() {
        return Err(IdentityError::malformed_serial(raw, "serial is empty"));
    }
    if !raw.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(IdentityError::malformed_serial(raw, "serial is not hexadecimal"));
    }
    if raw.len() % 2 != 0 {
        return Err(IdentityError::malformed_serial(raw, "serial has odd length"));
    }

    let pairs: Vec<&str> = raw
        .as_bytes()
        .chunks(2)
        // ASCII hex was checked above, so every chunk is valid UTF-8
        .filter_map(|pair| std::str::from_utf8(pair).ok())
        .collect();

    Ok(pairs.join(":"))
}
