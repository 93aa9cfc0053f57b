//! Outbound envelope signing.
//!
//! One Ed25519 signature covers the Messaging header, the Body, and every
//! attachment. The `SignedInfo` block is rendered exactly once; the bytes
//! that were signed are the bytes spliced into the envelope, which is why
//! the declared canonicalization is "as embedded". Attachments are digested
//! in their transmitted form, so compression must already have happened.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use corten_mime::Attachment;
use corten_model::ns;
use corten_model::wire::write::{element_to_string, RenderedEnvelope};
use corten_model::SoapVersion;
use sha2::{Digest, Sha256};
use uuid::Uuid;
use xmltree::{Element, Namespace, XMLNode};

use crate::algorithms;
use crate::error::SecurityError;
use crate::keys::SigningKeypair;

/// What to sign with. Algorithm URIs default to the allowlist and are
/// re-checked at signing time so a hand-assembled config cannot smuggle
/// in something the receiving side would reject.
pub struct SigningConfig {
    pub keypair: SigningKeypair,
    pub signature_algorithm: String,
    pub digest_algorithm: String,
}

impl SigningConfig {
    pub fn new(keypair: SigningKeypair) -> Self {
        Self {
            keypair,
            signature_algorithm: algorithms::SIGNATURE_ED25519.to_string(),
            digest_algorithm: algorithms::DIGEST_SHA256.to_string(),
        }
    }
}

/// A signed envelope, ready to send or to encrypt.
///
/// Keeps the security header blocks and the attachment digests around so
/// the encryption step can prepend its key material and prove the
/// attachment bytes have not drifted since signing.
pub struct SignedEnvelope {
    pub(crate) envelope: RenderedEnvelope,
    pub(crate) blocks: Vec<String>,
    pub(crate) attachment_digests: Vec<(String, String)>,
}

impl SignedEnvelope {
    pub fn envelope(&self) -> &RenderedEnvelope {
        &self.envelope
    }

    /// The complete envelope document.
    pub fn assemble(&self) -> String {
        self.envelope.assemble()
    }

    pub fn into_envelope(self) -> RenderedEnvelope {
        self.envelope
    }
}

/// Sign an envelope and its attachments.
///
/// References are `#<messaging wsu:Id>`, `#<body wsu:Id>`, then one
/// `cid:<id>` per attachment in the caller's order.
///
/// # Errors
///
/// [`SecurityError::OrderViolation`] when the envelope already carries a
/// security header: signing is the first security operation, and signing
/// encrypted content would sign ciphertext.
pub fn sign(
    mut envelope: RenderedEnvelope,
    attachments: &[Attachment],
    config: &SigningConfig,
) -> Result<SignedEnvelope, SecurityError> {
    if envelope.security_xml.is_some() {
        return Err(SecurityError::OrderViolation(
            "envelope already carries a security header; sign must come first",
        ));
    }
    algorithms::require_signature(&config.signature_algorithm)?;
    algorithms::require_digest(&config.digest_algorithm)?;

    let mut references = Vec::with_capacity(attachments.len() + 2);
    references.push((
        format!("#{}", envelope.messaging_id),
        digest_b64(envelope.messaging_xml.as_bytes()),
    ));
    references.push((
        format!("#{}", envelope.body_id),
        digest_b64(envelope.body_xml.as_bytes()),
    ));
    let mut attachment_digests = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        let digest = digest_b64(&attachment.bytes()?);
        references.push((format!("cid:{}", attachment.id()), digest.clone()));
        attachment_digests.push((attachment.id().to_string(), digest));
    }

    let signed_info_xml = render_signed_info(config, &references)?;
    let signature_b64 = BASE64.encode(config.keypair.sign(signed_info_xml.as_bytes()).to_bytes());

    let token_id = format!("token-{}", Uuid::new_v4());
    let key_b64 = BASE64.encode(config.keypair.verifying_key().as_bytes());
    let key_id = config.keypair.key_id();

    let token_xml = format!(
        "<wsse:BinarySecurityToken wsu:Id=\"{token_id}\" EncodingType=\"{encoding}\" \
         ValueType=\"{value_type}\">{key_b64}</wsse:BinarySecurityToken>",
        encoding = algorithms::ENCODING_BASE64,
        value_type = algorithms::TOKEN_ED25519,
    );
    let signature_xml = format!(
        "<ds:Signature xmlns:ds=\"{dsig}\">{signed_info_xml}\
         <ds:SignatureValue>{signature_b64}</ds:SignatureValue>\
         <ds:KeyInfo><wsse:SecurityTokenReference>\
         <wsse:Reference URI=\"#{token_id}\" ValueType=\"{token_type}\"/>\
         <wsse:KeyIdentifier ValueType=\"{id_type}\">{key_id}</wsse:KeyIdentifier>\
         </wsse:SecurityTokenReference></ds:KeyInfo></ds:Signature>",
        dsig = ns::DSIG,
        token_type = algorithms::TOKEN_ED25519,
        id_type = algorithms::TOKEN_KEY_ID,
    );

    let blocks = vec![token_xml, signature_xml];
    envelope.security_xml = Some(render_security_header(envelope.soap_version, &blocks));

    tracing::debug!(
        references = references.len(),
        key_id = %key_id,
        "signed outbound envelope"
    );

    Ok(SignedEnvelope {
        envelope,
        blocks,
        attachment_digests,
    })
}

pub(crate) fn digest_b64(bytes: &[u8]) -> String {
    BASE64.encode(Sha256::digest(bytes))
}

/// Wrap security blocks in the `wsse:Security` header element. The chunk
/// binds its own prefixes except `env`, which the envelope root provides.
pub(crate) fn render_security_header(soap_version: SoapVersion, blocks: &[String]) -> String {
    format!(
        "<wsse:Security xmlns:wsse=\"{wsse}\" xmlns:wsu=\"{wsu}\" xmlns:env=\"{env}\" \
         env:mustUnderstand=\"{must}\">{inner}</wsse:Security>",
        wsse = ns::WSSE,
        wsu = ns::WSU,
        env = soap_version.namespace(),
        must = soap_version.must_understand(),
        inner = blocks.concat(),
    )
}

fn render_signed_info(
    config: &SigningConfig,
    references: &[(String, String)],
) -> Result<String, SecurityError> {
    let mut signed_info = ds(ns::node::SIGNED_INFO);
    let mut bindings = Namespace::empty();
    bindings.put(ns::prefix::DSIG, ns::DSIG);
    signed_info.namespaces = Some(bindings);

    let mut c14n = ds(ns::node::CANONICALIZATION_METHOD);
    c14n.attributes
        .insert(ns::attr::ALGORITHM.into(), algorithms::C14N_AS_EMBEDDED.into());
    signed_info.children.push(XMLNode::Element(c14n));

    let mut method = ds(ns::node::SIGNATURE_METHOD);
    method
        .attributes
        .insert(ns::attr::ALGORITHM.into(), config.signature_algorithm.clone());
    signed_info.children.push(XMLNode::Element(method));

    for (uri, digest) in references {
        let mut reference = ds(ns::node::REFERENCE);
        reference
            .attributes
            .insert(ns::attr::URI.into(), uri.clone());

        let mut digest_method = ds(ns::node::DIGEST_METHOD);
        digest_method
            .attributes
            .insert(ns::attr::ALGORITHM.into(), config.digest_algorithm.clone());
        reference.children.push(XMLNode::Element(digest_method));

        let mut digest_value = ds(ns::node::DIGEST_VALUE);
        digest_value.children.push(XMLNode::Text(digest.clone()));
        reference.children.push(XMLNode::Element(digest_value));

        signed_info.children.push(XMLNode::Element(reference));
    }

    Ok(element_to_string(&signed_info)?)
}

fn ds(name: &str) -> Element {
    let mut element = Element::new(name);
    element.prefix = Some(ns::prefix::DSIG.into());
    element.namespace = Some(ns::DSIG.into());
    element
}
