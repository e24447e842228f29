//! IdP metadata document (§6 "IdP metadata"): the `<md:EntityDescriptor>`
//! SAML SPs consume to discover this IdP's SSO bindings and signing
//! certificate, mirroring the role `discovery::discovery_document` plays
//! for OIDC.

use crate::prelude::*;
use crate::sign;
use crate::xml::escape;

pub async fn idp_metadata_document(app: &App, tenant_id: Option<TnId>, issuer: &str) -> ClResult<String> {
	let key = app.signing_store.active_key(tenant_id, "RS256").await?;
	let certificate = sign::certificate_base64(&key)?;

	let sso_redirect = format!("{issuer}/saml/sso");
	let sso_post = format!("{issuer}/saml/sso");
	let slo = format!("{issuer}/saml/slo");

	Ok(format!(
		"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
		<md:EntityDescriptor xmlns:md=\"urn:oasis:names:tc:SAML:2.0:metadata\" entityID=\"{entity_id}\">\
			<md:IDPSSODescriptor protocolSupportEnumeration=\"urn:oasis:names:tc:SAML:2.0:protocol\" WantAuthnRequestsSigned=\"false\">\
				<md:KeyDescriptor use=\"signing\">\
					<ds:KeyInfo xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\">\
						<ds:X509Data><ds:X509Certificate>{certificate}</ds:X509Certificate></ds:X509Data>\
					</ds:KeyInfo>\
				</md:KeyDescriptor>\
				<md:SingleLogoutService Binding=\"urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect\" Location=\"{slo}\"/>\
				<md:NameIDFormat>urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress</md:NameIDFormat>\
				<md:NameIDFormat>urn:oasis:names:tc:SAML:2.0:nameid-format:persistent</md:NameIDFormat>\
				<md:SingleSignOnService Binding=\"urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect\" Location=\"{sso_redirect}\"/>\
				<md:SingleSignOnService Binding=\"urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST\" Location=\"{sso_post}\"/>\
			</md:IDPSSODescriptor>\
		</md:EntityDescriptor>",
		entity_id = escape(issuer),
		certificate = certificate,
		slo = escape(&slo),
		sso_redirect = escape(&sso_redirect),
		sso_post = escape(&sso_post),
	))
}

// vim: ts=4
