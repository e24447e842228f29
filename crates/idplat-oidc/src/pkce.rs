//! PKCE verification (RFC 7636): only the `S256` transform is accepted,
//! `plain` is rejected outright since it defeats the point of carrying a
//! challenge at all.

use sha2::{Digest, Sha256};

use idplat_types::utils::to_base64url_no_pad;

use crate::prelude::*;

pub fn verify(code_challenge: &str, code_challenge_method: Option<&str>, code_verifier: &str) -> ClResult<()> {
	match code_challenge_method {
		Some("S256") | None => {
			let computed = to_base64url_no_pad(&Sha256::digest(code_verifier.as_bytes()));
			if computed == code_challenge {
				Ok(())
			} else {
				Err(Error::InvalidGrant("PKCE code_verifier does not match code_challenge".into()))
			}
		}
		Some("plain") => Err(Error::InvalidRequest("the plain PKCE transform is not accepted".into())),
		Some(other) => Err(Error::InvalidRequest(format!("unsupported code_challenge_method: {other}"))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn s256_round_trips() {
		let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
		let challenge = to_base64url_no_pad(&Sha256::digest(verifier.as_bytes()));
		assert!(verify(&challenge, Some("S256"), verifier).is_ok());
	}

	#[test]
	fn plain_is_rejected() {
		assert!(verify("abc", Some("plain"), "abc").is_err());
	}

	#[test]
	fn mismatch_is_rejected() {
		let challenge = to_base64url_no_pad(&Sha256::digest(b"right-verifier"));
		assert!(verify(&challenge, Some("S256"), "wrong-verifier").is_err());
	}
}

// vim: ts=4
