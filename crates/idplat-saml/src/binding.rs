//! SAML HTTP bindings (§4.6, §6 "SAML AuthnRequest/Response: per SAMLCore
//! 2.0 ... POST binding base64-encoded, Redirect binding
//! base64+DEFLATE+URL-encoded").

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::prelude::*;

/// Decodes a Redirect-binding query parameter: URL-decoding is already
/// done by the caller's query-string extractor, so this only reverses
/// base64 and raw DEFLATE (no zlib/gzip header, per the SAML binding spec).
pub fn decode_redirect(encoded: &str) -> ClResult<String> {
	let compressed = STANDARD.decode(encoded).map_err(|e| Error::InvalidRequest(format!("SAML redirect param is not valid base64: {e}")))?;
	let mut decoder = DeflateDecoder::new(&compressed[..]);
	let mut xml = String::new();
	decoder.read_to_string(&mut xml).map_err(|e| Error::InvalidRequest(format!("SAML redirect param failed to inflate: {e}")))?;
	Ok(xml)
}

/// Encodes an XML document for the Redirect binding: raw DEFLATE then
/// base64. The caller is responsible for percent-encoding the result
/// into the query string.
pub fn encode_redirect(xml: &str) -> ClResult<String> {
	let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
	encoder.write_all(xml.as_bytes()).map_err(|e| Error::Internal(format!("SAML redirect param failed to deflate: {e}")))?;
	let compressed = encoder.finish().map_err(|e| Error::Internal(format!("SAML redirect param failed to deflate: {e}")))?;
	Ok(STANDARD.encode(compressed))
}

/// Decodes a POST-binding form field: plain base64, no compression.
pub fn decode_post(encoded: &str) -> ClResult<String> {
	let raw = STANDARD.decode(encoded.trim()).map_err(|e| Error::InvalidRequest(format!("SAML POST param is not valid base64: {e}")))?;
	String::from_utf8(raw).map_err(|e| Error::InvalidRequest(format!("SAML POST param is not valid UTF-8: {e}")))
}

/// Encodes an XML document for the POST binding.
pub fn encode_post(xml: &str) -> String {
	STANDARD.encode(xml.as_bytes())
}

fn escape_attr(value: &str) -> String {
	value.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;").replace('>', "&gt;")
}

/// An auto-posting HTML form targeting `destination` with `SAMLResponse`
/// (or `SAMLRequest`) and `RelayState`, per §4.6 "Returns an
/// auto-posting HTML form targeting the ACS URL".
pub fn auto_post_form(destination: &str, field_name: &str, encoded_message: &str, relay_state: Option<&str>) -> String {
	let relay_state_input = relay_state
		.map(|rs| format!("<input type=\"hidden\" name=\"RelayState\" value=\"{}\"/>", escape_attr(rs)))
		.unwrap_or_default();
	format!(
		"<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head><body onload=\"document.forms[0].submit()\">\
		<form method=\"post\" action=\"{}\">\
		<input type=\"hidden\" name=\"{}\" value=\"{}\"/>{}\
		<noscript><input type=\"submit\" value=\"Continue\"/></noscript>\
		</form></body></html>",
		escape_attr(destination),
		field_name,
		escape_attr(encoded_message),
		relay_state_input,
	)
}

// vim: ts=4
