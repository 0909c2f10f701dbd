//! Time-based one-time password engine.
//!
//! Secrets are 160-bit random values handed out base32-encoded so any
//! standard authenticator app can import them. Codes are the usual SHA-1,
//! six digit, 30-second-step variety; verification accepts the current step
//! plus one step of clock skew on either side.

pub mod recovery;

use anyhow::{Result, anyhow};
use std::time::{SystemTime, UNIX_EPOCH};
use totp_rs::{Algorithm, Secret, TOTP};

const DIGITS: usize = 6;
const SKEW: u8 = 1;
const STEP_SECONDS: u64 = 30;

/// Generate a fresh base32-encoded secret with 160 bits of entropy.
#[must_use]
pub fn generate_secret() -> String {
    match Secret::generate_secret().to_encoded() {
        Secret::Encoded(encoded) => encoded,
        raw => raw.to_string(),
    }
}

/// Build the `otpauth://` provisioning URL the client renders as a QR code.
///
/// The URL is deterministic for a given issuer, account and secret.
///
/// # Errors
/// Returns an error if the secret is not valid base32 or the labels are
/// rejected by the provisioning format (e.g. contain `:`).
pub fn provisioning_url(issuer: &str, account: &str, secret_base32: &str) -> Result<String> {
    let totp = totp_for(
        secret_base32,
        Some(issuer.to_string()),
        account.to_string(),
    )?;
    Ok(totp.get_url())
}

/// Verify a submitted code against a secret at the given unix time.
///
/// Malformed input (wrong length, non-digits, undecodable secret) is
/// reported as a plain mismatch, never an error.
#[must_use]
pub fn verify_code(secret_base32: &str, code: &str, at_unix: u64) -> bool {
    if code.len() != DIGITS || !code.bytes().all(|byte| byte.is_ascii_digit()) {
        return false;
    }
    let Ok(totp) = totp_for(secret_base32, None, "verify".to_string()) else {
        return false;
    };
    totp.check(code, at_unix)
}

/// Compute the canonical code for a secret at the given unix time.
pub(crate) fn code_at(secret_base32: &str, at_unix: u64) -> Result<String> {
    let totp = totp_for(secret_base32, None, "verify".to_string())?;
    Ok(totp.generate(at_unix))
}

/// Current unix time in seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

fn totp_for(secret_base32: &str, issuer: Option<String>, account: String) -> Result<TOTP> {
    let secret_bytes = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .map_err(|err| anyhow!("invalid base32 secret: {err}"))?;
    TOTP::new(
        Algorithm::SHA1,
        DIGITS,
        SKEW,
        STEP_SECONDS,
        secret_bytes,
        issuer,
        account,
    )
    .map_err(|err| anyhow!("TOTP init error: {err}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::{STEP_SECONDS, code_at, generate_secret, provisioning_url, verify_code};
    use totp_rs::Secret;

    // Arbitrary fixed instant, aligned and unaligned variants below.
    const T: u64 = 1_700_000_010;

    #[test]
    fn generated_secret_is_decodable_and_long_enough() {
        let secret = generate_secret();
        let bytes = Secret::Encoded(secret).to_bytes().unwrap();
        assert!(bytes.len() * 8 >= 160, "expected at least 160 bits");
    }

    #[test]
    fn generated_secrets_are_unique() {
        assert_ne!(generate_secret(), generate_secret());
    }

    #[test]
    fn provisioning_url_embeds_issuer_account_and_secret() {
        let secret = generate_secret();
        let url = provisioning_url("Uzno", "alice@example.com", &secret).unwrap();
        assert!(url.starts_with("otpauth://totp/"));
        assert!(url.contains("issuer=Uzno"));
        assert!(url.contains(&secret));
        // Deterministic: same inputs, same artifact.
        let again = provisioning_url("Uzno", "alice@example.com", &secret).unwrap();
        assert_eq!(url, again);
    }

    #[test]
    fn canonical_code_round_trips_at_any_instant() {
        let secret = generate_secret();
        for at in [0, 59, T, T + 7, 4_000_000_000] {
            let code = code_at(&secret, at).unwrap();
            assert!(verify_code(&secret, &code, at), "failed at t={at}");
        }
    }

    #[test]
    fn adjacent_steps_are_tolerated() {
        let secret = generate_secret();
        let code = code_at(&secret, T).unwrap();
        assert!(verify_code(&secret, &code, T + STEP_SECONDS));
        assert!(verify_code(&secret, &code, T.saturating_sub(STEP_SECONDS)));
    }

    #[test]
    fn codes_two_steps_away_are_rejected() {
        let secret = generate_secret();
        // Use a step-aligned instant so the distance is exactly two steps.
        let aligned = T - (T % STEP_SECONDS);
        let stale = code_at(&secret, aligned - 2 * STEP_SECONDS).unwrap();
        let future = code_at(&secret, aligned + 2 * STEP_SECONDS).unwrap();
        if stale != code_at(&secret, aligned).unwrap() {
            assert!(!verify_code(&secret, &stale, aligned));
        }
        if future != code_at(&secret, aligned).unwrap() {
            assert!(!verify_code(&secret, &future, aligned));
        }
    }

    #[test]
    fn malformed_codes_never_match() {
        let secret = generate_secret();
        assert!(!verify_code(&secret, "", T));
        assert!(!verify_code(&secret, "12345", T));
        assert!(!verify_code(&secret, "1234567", T));
        assert!(!verify_code(&secret, "12a456", T));
        assert!(!verify_code(&secret, "......", T));
    }

    #[test]
    fn undecodable_secret_never_matches() {
        assert!(!verify_code("not base32!!", "123456", T));
        assert!(!verify_code("", "123456", T));
    }
}
