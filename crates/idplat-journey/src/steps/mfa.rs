//! Mfa step handler (§4.2): "selects method (TOTP, SMS-OTP, email-OTP),
//! delivers challenge via messaging providers, validates response,
//! updates AMR." Only TOTP is implemented; SMS/email delivery is left
//! to a registered claims/messaging extension this crate doesn't own.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha1::Sha1;

use idplat_core::step_handler::{StepExecutionContext, StepHandler, StepHandlerResult};
use idplat_types::prelude::*;

type HmacSha1 = Hmac<Sha1>;

pub struct Mfa;

#[async_trait]
impl StepHandler for Mfa {
	fn step_type(&self) -> &'static str {
		"mfa_totp"
	}

	async fn execute(
		&self,
		ctx: &mut StepExecutionContext<'_>,
		_cancellation: tokio_util::sync::CancellationToken,
	) -> ClResult<StepHandlerResult> {
		let Some(code) = ctx.user_input.get("code").and_then(|v| v.as_str()) else {
			return Ok(StepHandlerResult::RequireInput("_Mfa".into(), json!({"method": "totp"})));
		};

		let Some(subject_id) = ctx.user_id.clone() else {
			return Ok(StepHandlerResult::Fail("access_denied".into(), "mfa requires an authenticated subject".into()));
		};
		let user = ctx.app.user_store.find_user_by_id(ctx.tenant_id, &subject_id).await?;
		let Some(secret) = user.totp_secret.as_deref() else {
			return Ok(StepHandlerResult::Fail("access_denied".into(), "no totp secret enrolled".into()));
		};

		if !verify_totp(secret, code, Timestamp::now().0) {
			return Ok(StepHandlerResult::Fail("access_denied".into(), "invalid mfa code".into()));
		}

		ctx.amr.push("otp".into());
		Ok(StepHandlerResult::Success(Default::default()))
	}
}

const TOTP_STEP_SECS: i64 = 30;
const TOTP_DIGITS: u32 = 6;
const TOTP_SKEW_STEPS: i64 = 1;

fn verify_totp(base32_secret: &str, candidate: &str, now: i64) -> bool {
	let Some(secret) = decode_base32(base32_secret) else { return false };
	for skew in -TOTP_SKEW_STEPS..=TOTP_SKEW_STEPS {
		let counter = (now / TOTP_STEP_SECS) + skew;
		if totp_at(&secret, counter) == candidate {
			return true;
		}
	}
	false
}

fn totp_at(secret: &[u8], counter: i64) -> String {
	let Ok(mut mac) = HmacSha1::new_from_slice(secret) else { return String::new() };
	mac.update(&counter.to_be_bytes());
	let digest = mac.finalize().into_bytes();
	let offset = (digest[digest.len() - 1] & 0x0f) as usize;
	let truncated = ((u32::from(digest[offset]) & 0x7f) << 24)
		| (u32::from(digest[offset + 1]) << 16)
		| (u32::from(digest[offset + 2]) << 8)
		| u32::from(digest[offset + 3]);
	let code = truncated % 10u32.pow(TOTP_DIGITS);
	format!("{:0width$}", code, width = TOTP_DIGITS as usize)
}

/// RFC 4648 base32 decode (no padding required), used for TOTP secrets.
fn decode_base32(input: &str) -> Option<Vec<u8>> {
	const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
	let mut bits: u64 = 0;
	let mut bit_count = 0u32;
	let mut out = Vec::new();
	for c in input.trim_end_matches('=').chars() {
		let val = ALPHABET.iter().position(|&b| b as char == c.to_ascii_uppercase())? as u64;
		bits = (bits << 5) | val;
		bit_count += 5;
		if bit_count >= 8 {
			bit_count -= 8;
			out.push(((bits >> bit_count) & 0xff) as u8);
		}
	}
	Some(out)
}

// vim: ts=4
