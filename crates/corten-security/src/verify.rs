//! Inbound security processing.
//!
//! Processing order is part of the contract:
//! 1. Locate the security header; allowlist every declared algorithm URI
//! 2. Cross-check attachment Content-IDs against the declared part hrefs
//! 3. Decrypt, then verify digests and the signature over received bytes
//! 4. Collect surfaced verification keys, preferring the binary token
//! 5. Land decrypted attachment content in re-readable storage
//!
//! Step 3 failures are one undifferentiated condition: wrong key, bad
//! padding, digest drift and a forged signature all surface identically.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use corten_mime::Attachment;
use corten_model::ns;
use corten_model::SignedReference;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::algorithms;
use crate::error::SecurityError;
use crate::keys::{self, TrustMaterial};
use crate::session;
use crate::sign::digest_b64;
use crate::xmldsig::{
    build_id_map, find_child_element, find_child_elements, find_element, required_attr,
    required_child, text_compact,
};

/// The verified signer of an inbound message.
#[derive(Debug, Clone)]
pub struct SignerInfo {
    pub key_id: String,
    pub verifying_key: VerifyingKey,
    /// Whether the key arrived as a binary security token rather than
    /// through a trust-store lookup.
    pub carried_as_token: bool,
}

/// Outcome of inbound security processing.
///
/// `is_signed` and `is_encrypted` mean detected *and succeeded*. A message
/// whose signature failed never produces a state; the processor errors out
/// instead, so a returned state is always fully verified.
#[derive(Debug, Default)]
pub struct SecurityState {
    pub is_encrypted: bool,
    pub is_signed: bool,
    pub signer: Option<SignerInfo>,
    pub signed_references: Vec<SignedReference>,
    /// The restored Body element bytes, present when the body was encrypted.
    pub decrypted_body: Option<Vec<u8>>,
}

#[derive(Default)]
struct Declarations {
    encryption: Option<EncryptionDeclaration>,
    signed: bool,
}

struct EncryptionDeclaration {
    ephemeral_public: [u8; 32],
    recipient_key_id: String,
    data_references: Vec<String>,
}

/// Run inbound security processing over a received document.
///
/// `attachments` are mutated in place: encrypted ones come back decrypted,
/// spilled to disk above `spool_threshold`. The document itself is never
/// mutated; the restored body is handed back in the state.
pub fn process(
    document: &str,
    attachments: &mut [Attachment],
    trust: &TrustMaterial,
    spool_threshold: u64,
) -> Result<SecurityState, SecurityError> {
    let doc = roxmltree::Document::parse(document)
        .map_err(|e| SecurityError::MalformedSecurity(format!("document does not parse: {e}")))?;

    // 1. Locate the security header, parse it, allowlist algorithms.
    let declared = match locate_security(&doc) {
        Some(security) => parse_declarations(security)?,
        None => Declarations::default(),
    };

    // 2. Every attachment must be declared when part declarations exist.
    cross_check_attachments(&doc, attachments)?;

    let mut state = SecurityState::default();

    // 3a. Decrypt. Attachment cleartext goes straight to re-readable
    // storage (step 5); the body is restored into a patched document so
    // digests can run over exactly the bytes that were signed.
    let mut patched: Option<String> = None;
    if let Some(encryption) = &declared.encryption {
        let keypair = trust.decryption().ok_or_else(|| {
            SecurityError::Crypto("message is encrypted but no decryption key is configured".into())
        })?;
        if encryption.recipient_key_id != keypair.key_id() {
            return Err(SecurityError::Crypto(format!(
                "message encrypted for key {}, ours is {}",
                encryption.recipient_key_id,
                keypair.key_id(),
            )));
        }
        let shared =
            keypair.diffie_hellman(&x25519_dalek::PublicKey::from(encryption.ephemeral_public));
        let key = session::derive_session_key(&shared)?;

        for uri in &encryption.data_references {
            if let Some(id) = uri.strip_prefix("cid:") {
                let attachment = attachments
                    .iter_mut()
                    .find(|a| a.id() == id)
                    .ok_or_else(|| {
                        SecurityError::Crypto(format!(
                            "data reference to unknown attachment: {uri}"
                        ))
                    })?;
                let clear = session::open(&key, &attachment.bytes()?)?;
                attachment.replace_with_cleartext(clear, spool_threshold)?;
            } else if let Some(id) = uri.strip_prefix('#') {
                if patched.is_some() {
                    return Err(SecurityError::Crypto(
                        "more than one encrypted body reference".into(),
                    ));
                }
                let (restored_doc, body_bytes) = decrypt_body(&doc, document, id, &key)?;
                patched = Some(restored_doc);
                state.decrypted_body = Some(body_bytes);
            } else {
                return Err(SecurityError::Crypto(format!(
                    "unresolvable data reference: {uri}"
                )));
            }
        }
        state.is_encrypted = true;
    }

    // 3b. Verify digests and the signature over the (restored) bytes.
    let verify_text: &str = patched.as_deref().unwrap_or(document);
    let patched_doc;
    let verify_doc = match &patched {
        Some(text) => {
            patched_doc = roxmltree::Document::parse(text).map_err(|e| {
                SecurityError::Crypto(format!("restored document does not parse: {e}"))
            })?;
            &patched_doc
        }
        None => &doc,
    };

    if declared.signed {
        let signer = verify_signature(verify_doc, verify_text, attachments, trust)?;
        state.signed_references = crate::xmldsig::extract_signed_references(verify_doc);
        tracing::debug!(
            signer = %signer.key_id,
            references = state.signed_references.len(),
            "inbound signature verified"
        );
        state.is_signed = true;
        state.signer = Some(signer);
    }

    Ok(state)
}

fn locate_security<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
) -> Option<roxmltree::Node<'a, 'input>> {
    let root = doc.root_element();
    let envelope_ns = root.tag_name().namespace()?;
    let header = find_child_element(root, envelope_ns, ns::node::HEADER)?;
    find_child_element(header, ns::WSSE, ns::node::SECURITY)
}

fn parse_declarations(
    security: roxmltree::Node<'_, '_>,
) -> Result<Declarations, SecurityError> {
    let mut declared = Declarations::default();

    if let Some(encrypted_key) = find_child_element(security, ns::XENC, ns::node::ENCRYPTED_KEY) {
        let method = required_child(encrypted_key, ns::XENC, ns::node::ENCRYPTION_METHOD)?;
        algorithms::require_encryption(required_attr(method, ns::attr::ALGORITHM)?)?;

        let key_info = required_child(encrypted_key, ns::DSIG, ns::node::KEY_INFO)?;
        let agreement = required_child(key_info, ns::XENC, ns::node::AGREEMENT_METHOD)?;
        algorithms::require_key_agreement(required_attr(agreement, ns::attr::ALGORITHM)?)?;

        let originator = required_child(agreement, ns::XENC, ns::node::ORIGINATOR_KEY_INFO)?;
        let key_value = required_child(originator, ns::DSIG, ns::node::KEY_VALUE)?;
        let ephemeral = BASE64
            .decode(text_compact(key_value))
            .map_err(|e| SecurityError::MalformedSecurity(format!("ephemeral key: {e}")))?;
        let ephemeral_public: [u8; 32] = ephemeral
            .try_into()
            .map_err(|_| SecurityError::MalformedSecurity("ephemeral key is not 32 bytes".into()))?;

        let recipient = required_child(agreement, ns::XENC, ns::node::RECIPIENT_KEY_INFO)?;
        let recipient_key_id =
            text_compact(required_child(recipient, ns::DSIG, ns::node::KEY_NAME)?);

        let reference_list = required_child(encrypted_key, ns::XENC, ns::node::REFERENCE_LIST)?;
        let data_references = find_child_elements(reference_list, ns::XENC, ns::node::DATA_REFERENCE)
            .into_iter()
            .map(|r| required_attr(r, ns::attr::URI).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;

        declared.encryption = Some(EncryptionDeclaration {
            ephemeral_public,
            recipient_key_id,
            data_references,
        });
    }

    if let Some(signature) = find_child_element(security, ns::DSIG, ns::node::SIGNATURE) {
        let signed_info = required_child(signature, ns::DSIG, ns::node::SIGNED_INFO)?;
        let c14n = required_child(signed_info, ns::DSIG, ns::node::CANONICALIZATION_METHOD)?;
        algorithms::require_c14n(required_attr(c14n, ns::attr::ALGORITHM)?)?;
        let method = required_child(signed_info, ns::DSIG, ns::node::SIGNATURE_METHOD)?;
        algorithms::require_signature(required_attr(method, ns::attr::ALGORITHM)?)?;
        for reference in find_child_elements(signed_info, ns::DSIG, ns::node::REFERENCE) {
            let digest_method = required_child(reference, ns::DSIG, ns::node::DIGEST_METHOD)?;
            algorithms::require_digest(required_attr(digest_method, ns::attr::ALGORITHM)?)?;
        }
        declared.signed = true;
    }

    Ok(declared)
}

fn cross_check_attachments(
    doc: &roxmltree::Document<'_>,
    attachments: &[Attachment],
) -> Result<(), SecurityError> {
    let hrefs: Vec<&str> = doc
        .descendants()
        .filter(|n| n.has_tag_name((ns::EBMS, ns::node::PART_INFO)))
        .filter_map(|n| n.attribute(ns::attr::HREF))
        .collect();
    if hrefs.is_empty() {
        // Nothing declared; the pipeline's count reconciliation decides.
        return Ok(());
    }
    for attachment in attachments {
        let expected = format!("cid:{}", attachment.id());
        if !hrefs.iter().any(|href| *href == expected) {
            return Err(SecurityError::AttachmentMismatch(
                attachment.id().to_string(),
            ));
        }
    }
    Ok(())
}

fn decrypt_body(
    doc: &roxmltree::Document<'_>,
    document: &str,
    enc_id: &str,
    key: &session::SessionKey,
) -> Result<(String, Vec<u8>), SecurityError> {
    let encrypted_data = doc
        .descendants()
        .find(|n| {
            n.has_tag_name((ns::XENC, ns::node::ENCRYPTED_DATA))
                && n.attribute(ns::attr::ID) == Some(enc_id)
        })
        .ok_or_else(|| {
            SecurityError::Crypto(format!("data reference to unknown element: #{enc_id}"))
        })?;
    let method = required_child(encrypted_data, ns::XENC, ns::node::ENCRYPTION_METHOD)?;
    algorithms::require_encryption(required_attr(method, ns::attr::ALGORITHM)?)?;

    let body = encrypted_data
        .ancestors()
        .find(|n| n.tag_name().name() == ns::node::BODY)
        .ok_or_else(|| SecurityError::Crypto("encrypted data outside the body".into()))?;

    let cipher_data = required_child(encrypted_data, ns::XENC, ns::node::CIPHER_DATA)?;
    let cipher_value = required_child(cipher_data, ns::XENC, ns::node::CIPHER_VALUE)?;
    let sealed = BASE64
        .decode(text_compact(cipher_value))
        .map_err(|e| SecurityError::Crypto(format!("cipher value: {e}")))?;

    let clear = session::open(key, &sealed)?;
    let body_xml = String::from_utf8(clear)
        .map_err(|_| SecurityError::Crypto("decrypted body is not UTF-8".into()))?;

    let range = body.range();
    let mut restored = String::with_capacity(document.len() + body_xml.len());
    restored.push_str(&document[..range.start]);
    restored.push_str(&body_xml);
    restored.push_str(&document[range.end..]);
    Ok((restored, body_xml.into_bytes()))
}

fn verify_signature(
    doc: &roxmltree::Document<'_>,
    text: &str,
    attachments: &[Attachment],
    trust: &TrustMaterial,
) -> Result<SignerInfo, SecurityError> {
    let sig_node = find_element(doc, ns::DSIG, ns::node::SIGNATURE)
        .ok_or_else(|| SecurityError::MalformedSecurity("missing Signature".into()))?;
    let signed_info = required_child(sig_node, ns::DSIG, ns::node::SIGNED_INFO)?;

    // Digests over the received byte spans, attachments over their
    // decrypted (transmitted-at-signing-time) bytes.
    let id_map = build_id_map(doc);
    for reference in find_child_elements(signed_info, ns::DSIG, ns::node::REFERENCE) {
        let uri = required_attr(reference, ns::attr::URI)?;
        let expected = text_compact(required_child(reference, ns::DSIG, ns::node::DIGEST_VALUE)?);
        let actual = if let Some(id) = uri.strip_prefix('#') {
            let node = id_map.get(id).ok_or_else(|| {
                SecurityError::Crypto(format!("signed reference to unknown element: {uri}"))
            })?;
            digest_b64(text[node.range()].as_bytes())
        } else if let Some(id) = uri.strip_prefix("cid:") {
            let attachment = attachments.iter().find(|a| a.id() == id).ok_or_else(|| {
                SecurityError::Crypto(format!("signed reference to unknown attachment: {uri}"))
            })?;
            digest_b64(&attachment.bytes()?)
        } else {
            return Err(SecurityError::Crypto(format!(
                "unresolvable signed reference: {uri}"
            )));
        };
        if actual != expected {
            return Err(SecurityError::Crypto(format!("digest mismatch for {uri}")));
        }
    }

    // 4. Collect surfaced keys, then hold the chosen one against the store.
    let signer = select_signer(doc, trust)?;
    if trust.signer(&signer.key_id).is_none() {
        return Err(SecurityError::Crypto(format!(
            "signer key not trusted: {}",
            signer.key_id
        )));
    }

    let sig_value_b64 = text_compact(required_child(sig_node, ns::DSIG, ns::node::SIGNATURE_VALUE)?);
    let sig_value = BASE64
        .decode(&sig_value_b64)
        .map_err(|e| SecurityError::Crypto(format!("signature value: {e}")))?;
    let signature = Signature::from_slice(&sig_value)
        .map_err(|e| SecurityError::Crypto(format!("signature value: {e}")))?;

    signer
        .verifying_key
        .verify(text[signed_info.range()].as_bytes(), &signature)
        .map_err(|_| SecurityError::Crypto("signature verification failed".into()))?;

    Ok(signer)
}

fn select_signer(
    doc: &roxmltree::Document<'_>,
    trust: &TrustMaterial,
) -> Result<SignerInfo, SecurityError> {
    let mut candidates: Vec<SignerInfo> = Vec::new();

    for token in doc
        .descendants()
        .filter(|n| n.has_tag_name((ns::WSSE, ns::node::BINARY_SECURITY_TOKEN)))
    {
        if token.attribute(ns::attr::VALUE_TYPE) != Some(algorithms::TOKEN_ED25519) {
            continue;
        }
        let decoded = BASE64
            .decode(text_compact(token))
            .map_err(|e| SecurityError::MalformedSecurity(format!("binary security token: {e}")))?;
        let bytes: [u8; 32] = decoded.try_into().map_err(|_| {
            SecurityError::MalformedSecurity("binary security token is not 32 bytes".into())
        })?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| SecurityError::Crypto(format!("binary security token: {e}")))?;
        push_candidate(
            &mut candidates,
            SignerInfo {
                key_id: keys::key_id(key.as_bytes()),
                verifying_key: key,
                carried_as_token: true,
            },
        );
    }

    for identifier in doc
        .descendants()
        .filter(|n| n.has_tag_name((ns::WSSE, ns::node::KEY_IDENTIFIER)))
    {
        let id = text_compact(identifier);
        if let Some(key) = trust.signer(&id) {
            push_candidate(
                &mut candidates,
                SignerInfo {
                    key_id: id,
                    verifying_key: *key,
                    carried_as_token: false,
                },
            );
        }
    }

    if candidates.is_empty() {
        return Err(SecurityError::Crypto("no verification key surfaced".into()));
    }
    if candidates.len() > 1 {
        if let Some(pos) = candidates.iter().position(|c| c.carried_as_token) {
            return Ok(candidates.swap_remove(pos));
        }
        tracing::warn!(
            surfaced = candidates.len(),
            "multiple verification keys surfaced without a binary token; taking the first"
        );
    }
    Ok(candidates.swap_remove(0))
}

fn push_candidate(candidates: &mut Vec<SignerInfo>, candidate: SignerInfo) {
    if !candidates
        .iter()
        .any(|c| c.verifying_key == candidate.verifying_key)
    {
        candidates.push(candidate);
    }
}
