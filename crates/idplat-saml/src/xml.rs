//! Minimal XML handling for the SAMLCore 2.0 messages this crate reads
//! and writes: attribute/text extraction for an inbound `AuthnRequest`,
//! and escaping for the `Response`/`Assertion` this crate builds as
//! formatted strings.

use std::borrow::Cow;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::prelude::*;

pub fn escape(value: &str) -> Cow<'_, str> {
	quick_xml::escape::escape(value)
}

#[derive(Debug, Clone)]
pub struct AuthnRequestInfo {
	pub id: String,
	pub issue_instant: String,
	pub destination: Option<String>,
	pub assertion_consumer_service_url: Option<String>,
	pub issuer: String,
	pub name_id_format: Option<String>,
	pub force_authn: bool,
}

fn local_name(qname: &[u8]) -> &[u8] {
	match qname.iter().position(|&b| b == b':') {
		Some(idx) => &qname[idx + 1..],
		None => qname,
	}
}

fn attr_value(event: &quick_xml::events::BytesStart<'_>, name: &[u8]) -> ClResult<Option<String>> {
	for attr in event.attributes() {
		let attr = attr.map_err(|e| Error::InvalidRequest(format!("malformed SAML XML attribute: {e}")))?;
		if local_name(attr.key.as_ref()) == name {
			let raw = String::from_utf8_lossy(attr.value.as_ref()).into_owned();
			let value = quick_xml::escape::unescape(&raw).map_err(|e| Error::InvalidRequest(format!("malformed SAML XML attribute value: {e}")))?;
			return Ok(Some(value.into_owned()));
		}
	}
	Ok(None)
}

/// Parses the subset of an `AuthnRequest` this IdP needs: the request's
/// own attributes, its `<saml:Issuer>` text, and an optional
/// `<samlp:NameIDPolicy Format="...">`.
pub fn parse_authn_request(xml: &str) -> ClResult<AuthnRequestInfo> {
	let mut reader = Reader::from_str(xml);
	reader.config_mut().trim_text = true;

	let mut id = None;
	let mut issue_instant = None;
	let mut destination = None;
	let mut acs_url = None;
	let mut force_authn = false;
	let mut name_id_format = None;
	let mut issuer = None;
	let mut in_issuer = false;

	loop {
		match reader.read_event().map_err(|e| Error::InvalidRequest(format!("malformed SAML AuthnRequest XML: {e}")))? {
			Event::Start(ref e) | Event::Empty(ref e) => {
				let name = local_name(e.name().as_ref()).to_vec();
				match name.as_slice() {
					b"AuthnRequest" => {
						id = attr_value(e, b"ID")?;
						issue_instant = attr_value(e, b"IssueInstant")?;
						destination = attr_value(e, b"Destination")?;
						acs_url = attr_value(e, b"AssertionConsumerServiceURL")?;
						force_authn = attr_value(e, b"ForceAuthn")?.as_deref() == Some("true");
					}
					b"NameIDPolicy" => {
						name_id_format = attr_value(e, b"Format")?;
					}
					b"Issuer" => {
						in_issuer = true;
					}
					_ => {}
				}
			}
			Event::Text(e) => {
				if in_issuer {
					let text = e.unescape().map_err(|err| Error::InvalidRequest(format!("malformed SAML Issuer text: {err}")))?;
					issuer = Some(text.into_owned());
				}
			}
			Event::End(ref e) => {
				if local_name(e.name().as_ref()) == b"Issuer" {
					in_issuer = false;
				}
			}
			Event::Eof => break,
			_ => {}
		}
	}

	Ok(AuthnRequestInfo {
		id: id.ok_or_else(|| Error::InvalidRequest("AuthnRequest is missing an ID attribute".into()))?,
		issue_instant: issue_instant.unwrap_or_default(),
		destination,
		assertion_consumer_service_url: acs_url,
		issuer: issuer.ok_or_else(|| Error::InvalidRequest("AuthnRequest is missing an Issuer".into()))?,
		name_id_format,
		force_authn,
	})
}

/// The handful of fields an SP needs out of an inbound `<samlp:Response>`
/// plus the raw `<saml:Assertion ...>...</saml:Assertion>` substring the
/// signature was computed over.
#[derive(Debug, Clone)]
pub struct ResponseInfo {
	pub id: String,
	pub in_response_to: Option<String>,
	pub destination: Option<String>,
	pub issuer: String,
	pub status_code: String,
	pub not_before: Option<String>,
	pub not_on_or_after: Option<String>,
	pub audience: Option<String>,
	pub name_id: Option<String>,
	pub signature_value: Option<String>,
	pub signed_content: Option<String>,
	pub attributes: Vec<(String, String)>,
}

/// Extracts the substring of `xml` bounded by the named element's
/// opening and closing tags (inclusive), used to recover exactly what a
/// `<ds:Reference>` signed. Finds the first start tag whose qualified
/// name ends in `:local` or equals `local`, then matches it against the
/// same qualified name's closing tag.
pub fn extract_element(xml: &str, local: &str) -> Option<String> {
	let bytes = xml.as_bytes();
	let mut pos = 0;
	while let Some(lt) = xml[pos..].find('<') {
		let tag_start = pos + lt;
		if bytes.get(tag_start + 1) == Some(&b'/') || bytes.get(tag_start + 1) == Some(&b'?') {
			pos = tag_start + 1;
			continue;
		}
		let tag_end = xml[tag_start..].find(|c: char| c.is_whitespace() || c == '>' || c == '/')?;
		let qname = &xml[tag_start + 1..tag_start + tag_end];
		if qname == local || qname.ends_with(&format!(":{local}")) {
			let close = format!("</{qname}>");
			let open_close = xml[tag_start..].find('>')?;
			if xml.as_bytes().get(tag_start + open_close - 1) == Some(&b'/') {
				// self-closing element, no content
				return Some(xml[tag_start..tag_start + open_close + 1].to_string());
			}
			let end = xml[tag_start..].find(&close)? + tag_start + close.len();
			return Some(xml[tag_start..end].to_string());
		}
		pos = tag_start + 1;
	}
	None
}

pub fn parse_response(xml: &str) -> ClResult<ResponseInfo> {
	let mut reader = Reader::from_str(xml);
	reader.config_mut().trim_text = true;

	let mut id = None;
	let mut in_response_to = None;
	let mut destination = None;
	let mut status_code = None;
	let mut not_before = None;
	let mut not_on_or_after = None;
	let mut audience = None;
	let mut name_id = None;
	let mut signature_value = None;
	let mut attributes = Vec::new();

	let mut issuer = None;
	let mut in_response_issuer = true; // the Response's own top-level Issuer comes first
	let mut in_signature_value = false;
	let mut in_name_id = false;
	let mut in_audience = false;
	let mut in_attribute_value = false;
	let mut current_attr_name: Option<String> = None;

	loop {
		match reader.read_event().map_err(|e| Error::InvalidRequest(format!("malformed SAML Response XML: {e}")))? {
			Event::Start(ref e) | Event::Empty(ref e) => {
				let name = local_name(e.name().as_ref()).to_vec();
				match name.as_slice() {
					b"Response" => {
						id = attr_value(e, b"ID")?;
						in_response_to = attr_value(e, b"InResponseTo")?;
						destination = attr_value(e, b"Destination")?;
					}
					b"StatusCode" => {
						status_code = attr_value(e, b"Value")?;
					}
					b"Conditions" => {
						not_before = attr_value(e, b"NotBefore")?;
						not_on_or_after = attr_value(e, b"NotOnOrAfter")?;
					}
					b"Audience" => {
						in_audience = true;
					}
					b"NameID" => {
						in_name_id = true;
					}
					b"SignatureValue" => {
						in_signature_value = true;
					}
					b"Attribute" => {
						current_attr_name = attr_value(e, b"Name")?;
					}
					b"AttributeValue" => {
						in_attribute_value = true;
					}
					b"Issuer" => {
						// handled via text event below
					}
					_ => {}
				}
			}
			Event::Text(e) => {
				let text = e.unescape().map_err(|err| Error::InvalidRequest(format!("malformed SAML Response text: {err}")))?.into_owned();
				if in_response_issuer && issuer.is_none() {
					issuer = Some(text.clone());
				}
				if in_name_id {
					name_id = Some(text.clone());
				}
				if in_signature_value {
					signature_value = Some(text.chars().filter(|c| !c.is_whitespace()).collect());
				}
				if in_attribute_value {
					if let Some(attr_name) = &current_attr_name {
						attributes.push((attr_name.clone(), text));
					}
				}
				if in_audience {
					audience = Some(text);
				}
			}
			Event::End(ref e) => {
				let name = local_name(e.name().as_ref());
				if name == b"Issuer" {
					in_response_issuer = false;
				}
				if name == b"NameID" {
					in_name_id = false;
				}
				if name == b"SignatureValue" {
					in_signature_value = false;
				}
				if name == b"Audience" {
					in_audience = false;
				}
				if name == b"AttributeValue" {
					in_attribute_value = false;
				}
			}
			Event::Eof => break,
			_ => {}
		}
	}

	Ok(ResponseInfo {
		id: id.ok_or_else(|| Error::InvalidRequest("Response is missing an ID attribute".into()))?,
		in_response_to,
		destination,
		issuer: issuer.ok_or_else(|| Error::InvalidRequest("Response is missing an Issuer".into()))?,
		status_code: status_code.unwrap_or_default(),
		not_before,
		not_on_or_after,
		audience,
		name_id,
		signature_value,
		signed_content: extract_element(xml, "Assertion"),
		attributes,
	})
}

// vim: ts=4
