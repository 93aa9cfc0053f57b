//! Outbound envelope encryption.
//!
//! One ephemeral X25519 agreement per message yields the session key; the
//! whole rendered Body element and/or each attachment's transmitted bytes
//! are replaced by sealed blobs. Decrypting restores the exact signed
//! bytes, which is what lets the receiver verify digests after decryption.
//!
//! Encryption comes after signing. [`encrypt`] accepts a plain or a signed
//! envelope; handing it content whose bytes drifted since signing, or an
//! envelope that already went through security, is an
//! [`OrderViolation`](SecurityError::OrderViolation).

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use corten_mime::Attachment;
use corten_model::ns;
use corten_model::wire::write::RenderedEnvelope;
use rand::rngs::OsRng;
use uuid::Uuid;

use crate::algorithms;
use crate::error::SecurityError;
use crate::keys;
use crate::session;
use crate::sign::{digest_b64, render_security_header, SignedEnvelope};

/// Who to encrypt for and what to cover.
pub struct EncryptionConfig {
    /// Recipient's static X25519 public key.
    pub recipient_public: x25519_dalek::PublicKey,
    pub key_agreement_algorithm: String,
    pub content_algorithm: String,
    pub encrypt_body: bool,
    pub encrypt_attachments: bool,
}

impl EncryptionConfig {
    pub fn new(recipient_public: x25519_dalek::PublicKey) -> Self {
        Self {
            recipient_public,
            key_agreement_algorithm: algorithms::KEY_AGREEMENT_X25519.to_string(),
            content_algorithm: algorithms::ENCRYPTION_XCHACHA20.to_string(),
            encrypt_body: true,
            encrypt_attachments: true,
        }
    }
}

/// Input to [`encrypt`]: a freshly rendered envelope or a signed one.
pub enum OutboundEnvelope {
    Plain(RenderedEnvelope),
    Signed(SignedEnvelope),
}

impl From<RenderedEnvelope> for OutboundEnvelope {
    fn from(envelope: RenderedEnvelope) -> Self {
        Self::Plain(envelope)
    }
}

impl From<SignedEnvelope> for OutboundEnvelope {
    fn from(signed: SignedEnvelope) -> Self {
        Self::Signed(signed)
    }
}

/// An encrypted envelope. Terminal: it can only be assembled and sent.
pub struct EncryptedEnvelope {
    envelope: RenderedEnvelope,
}

impl EncryptedEnvelope {
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

/// Encrypt the body and/or attachments for the configured recipient.
///
/// Attachments are sealed in place; their media type becomes
/// `application/octet-stream`. The `EncryptedKey` block joins the security
/// header ahead of any signature, carrying the ephemeral public key, the
/// recipient key id and one `DataReference` per sealed part.
pub fn encrypt(
    envelope: impl Into<OutboundEnvelope>,
    attachments: &mut [Attachment],
    config: &EncryptionConfig,
) -> Result<EncryptedEnvelope, SecurityError> {
    algorithms::require_key_agreement(&config.key_agreement_algorithm)?;
    algorithms::require_encryption(&config.content_algorithm)?;

    let (mut inner, mut blocks) = match envelope.into() {
        OutboundEnvelope::Plain(envelope) => {
            if envelope.security_xml.is_some() {
                return Err(SecurityError::OrderViolation(
                    "envelope already carries a security header; encrypt runs once, after signing",
                ));
            }
            (envelope, Vec::new())
        }
        OutboundEnvelope::Signed(signed) => {
            check_unchanged_since_signing(&signed, attachments)?;
            (signed.envelope, signed.blocks)
        }
    };

    let ephemeral = x25519_dalek::StaticSecret::random_from_rng(OsRng);
    let ephemeral_public = x25519_dalek::PublicKey::from(&ephemeral);
    let key = session::derive_session_key(&ephemeral.diffie_hellman(&config.recipient_public))?;

    let mut data_references = Vec::new();

    if config.encrypt_body {
        let sealed = session::seal(&key, inner.body_xml.as_bytes())?;
        let enc_id = format!("enc-{}", Uuid::new_v4());
        inner.body_xml = render_encrypted_body(
            &inner,
            &enc_id,
            &BASE64.encode(sealed),
            &config.content_algorithm,
        );
        data_references.push(format!("#{enc_id}"));
    }
    if config.encrypt_attachments {
        for attachment in attachments.iter_mut() {
            let sealed = session::seal(&key, &attachment.bytes()?)?;
            attachment.replace_with_ciphertext(sealed);
            data_references.push(format!("cid:{}", attachment.id()));
        }
    }
    if data_references.is_empty() {
        return Err(SecurityError::NothingToEncrypt);
    }

    let recipient_key_id = keys::key_id(config.recipient_public.as_bytes());
    let reference_list: String = data_references
        .iter()
        .map(|uri| format!("<xenc:DataReference URI=\"{uri}\"/>"))
        .collect();
    let encrypted_key_xml = format!(
        "<xenc:EncryptedKey xmlns:xenc=\"{xenc}\" xmlns:ds=\"{dsig}\" Id=\"enckey-{id}\">\
         <xenc:EncryptionMethod Algorithm=\"{content_alg}\"/>\
         <ds:KeyInfo><xenc:AgreementMethod Algorithm=\"{agreement_alg}\">\
         <xenc:OriginatorKeyInfo><ds:KeyValue>{ephemeral_b64}</ds:KeyValue></xenc:OriginatorKeyInfo>\
         <xenc:RecipientKeyInfo><ds:KeyName>{recipient_key_id}</ds:KeyName></xenc:RecipientKeyInfo>\
         </xenc:AgreementMethod></ds:KeyInfo>\
         <xenc:ReferenceList>{reference_list}</xenc:ReferenceList></xenc:EncryptedKey>",
        xenc = ns::XENC,
        dsig = ns::DSIG,
        id = Uuid::new_v4(),
        content_alg = config.content_algorithm,
        agreement_alg = config.key_agreement_algorithm,
        ephemeral_b64 = BASE64.encode(ephemeral_public.as_bytes()),
    );

    // Receivers process the header top-down: key material first.
    blocks.insert(0, encrypted_key_xml);
    inner.security_xml = Some(render_security_header(inner.soap_version, &blocks));

    tracing::debug!(
        parts = data_references.len(),
        recipient = %recipient_key_id,
        "encrypted outbound envelope"
    );

    Ok(EncryptedEnvelope { envelope: inner })
}

fn check_unchanged_since_signing(
    signed: &SignedEnvelope,
    attachments: &[Attachment],
) -> Result<(), SecurityError> {
    if signed.attachment_digests.len() != attachments.len() {
        return Err(SecurityError::OrderViolation(
            "attachment set changed between signing and encryption",
        ));
    }
    for attachment in attachments {
        let recorded = signed
            .attachment_digests
            .iter()
            .find(|(id, _)| id == attachment.id())
            .ok_or(SecurityError::OrderViolation(
                "attachment set changed between signing and encryption",
            ))?;
        if recorded.1 != digest_b64(&attachment.bytes()?) {
            return Err(SecurityError::OrderViolation(
                "attachment bytes changed after signing; compress before signing",
            ));
        }
    }
    Ok(())
}

fn render_encrypted_body(
    envelope: &RenderedEnvelope,
    enc_id: &str,
    cipher_b64: &str,
    content_algorithm: &str,
) -> String {
    format!(
        "<env:Body xmlns:env=\"{env}\" xmlns:wsu=\"{wsu}\" wsu:Id=\"{body_id}\">\
         <xenc:EncryptedData xmlns:xenc=\"{xenc}\" Id=\"{enc_id}\" Type=\"{xenc}Content\">\
         <xenc:EncryptionMethod Algorithm=\"{alg}\"/>\
         <xenc:CipherData><xenc:CipherValue>{cipher_b64}</xenc:CipherValue></xenc:CipherData>\
         </xenc:EncryptedData></env:Body>",
        env = envelope.soap_version.namespace(),
        wsu = ns::WSU,
        body_id = envelope.body_id,
        xenc = ns::XENC,
        alg = content_algorithm,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::DecryptionKeypair;
    use corten_model::wire::write::render_envelope;
    use corten_model::{
        CollaborationInfo, Message, MessageIdGenerator, MessageInfo, Party, PartyId, PartyInfo,
        Service, UserMessageDraft,
    };

    fn sample_message() -> Message {
        let info = MessageInfo::new(MessageIdGenerator::default().mint()).unwrap();
        let party = PartyInfo::new(
            Party::new(PartyId::new("acme").unwrap(), "Buyer").unwrap(),
            Party::new(PartyId::new("globex").unwrap(), "Seller").unwrap(),
        );
        let collab =
            CollaborationInfo::new(Service::new("urn:corten:svc:orders").unwrap(), "Submit", "c-1")
                .unwrap();
        let user = UserMessageDraft::new(info, party, collab).finish().unwrap();
        Message::user(corten_model::SoapVersion::Soap12, user)
    }

    #[test]
    fn recipient_can_open_the_sealed_body() {
        let rendered = render_envelope(&sample_message(), Some("<Secret>7</Secret>")).unwrap();
        let plain_body = rendered.body_xml.clone();
        let recipient = DecryptionKeypair::from_bytes([3u8; 32]);
        let config = EncryptionConfig::new(recipient.public_key());

        let encrypted = encrypt(rendered, &mut [], &config).unwrap();
        let envelope = encrypted.assemble();
        let doc = roxmltree::Document::parse(&envelope).unwrap();

        let ephemeral_b64 = doc
            .descendants()
            .find(|n| n.has_tag_name((ns::DSIG, ns::node::KEY_VALUE)))
            .and_then(|n| n.text())
            .unwrap();
        let mut ephemeral = [0u8; 32];
        ephemeral.copy_from_slice(&BASE64.decode(ephemeral_b64).unwrap());
        let shared = recipient.diffie_hellman(&x25519_dalek::PublicKey::from(ephemeral));
        let key = session::derive_session_key(&shared).unwrap();

        let cipher_b64 = doc
            .descendants()
            .find(|n| n.has_tag_name((ns::XENC, ns::node::CIPHER_VALUE)))
            .and_then(|n| n.text())
            .unwrap();
        let opened = session::open(&key, &BASE64.decode(cipher_b64).unwrap()).unwrap();
        assert_eq!(opened, plain_body.as_bytes());
    }

    #[test]
    fn attachments_are_sealed_and_remarked() {
        let rendered = render_envelope(&sample_message(), None).unwrap();
        let mut attachments =
            vec![Attachment::from_bytes("att-1", "text/csv", b"a,b,c\n".to_vec()).unwrap()];
        let recipient = DecryptionKeypair::from_bytes([4u8; 32]);
        let config = EncryptionConfig::new(recipient.public_key());

        let encrypted = encrypt(rendered, &mut attachments, &config).unwrap();
        assert_eq!(attachments[0].mime_type(), "application/octet-stream");
        assert_ne!(attachments[0].bytes().unwrap(), b"a,b,c\n".to_vec());

        let envelope = encrypted.assemble();
        let doc = roxmltree::Document::parse(&envelope).unwrap();
        let refs: Vec<&str> = doc
            .descendants()
            .filter(|n| n.has_tag_name((ns::XENC, ns::node::DATA_REFERENCE)))
            .filter_map(|n| n.attribute(ns::attr::URI))
            .collect();
        assert_eq!(refs.len(), 2);
        assert!(refs[0].starts_with("#enc-"));
        assert_eq!(refs[1], "cid:att-1");
    }

    #[test]
    fn compressing_after_signing_is_caught() {
        use crate::keys::SigningKeypair;
        use crate::sign::{sign, SigningConfig};

        let rendered = render_envelope(&sample_message(), None).unwrap();
        let mut attachments =
            vec![Attachment::from_bytes("att-1", "text/plain", vec![b'x'; 512]).unwrap()];
        let signed = sign(
            rendered,
            &attachments,
            &SigningConfig::new(SigningKeypair::generate()),
        )
        .unwrap();

        attachments[0].compress().unwrap();

        let recipient = DecryptionKeypair::from_bytes([5u8; 32]);
        let result = encrypt(
            signed,
            &mut attachments,
            &EncryptionConfig::new(recipient.public_key()),
        );
        assert!(matches!(result, Err(SecurityError::OrderViolation(_))));
    }

    #[test]
    fn double_encryption_is_an_order_violation() {
        let rendered = render_envelope(&sample_message(), None).unwrap();
        let recipient = DecryptionKeypair::from_bytes([6u8; 32]);
        let config = EncryptionConfig::new(recipient.public_key());

        let once = encrypt(rendered, &mut [], &config).unwrap();
        let again = encrypt(once.into_envelope(), &mut [], &config);
        assert!(matches!(again, Err(SecurityError::OrderViolation(_))));
    }

    #[test]
    fn nothing_selected_is_rejected() {
        let rendered = render_envelope(&sample_message(), None).unwrap();
        let recipient = DecryptionKeypair::from_bytes([7u8; 32]);
        let mut config = EncryptionConfig::new(recipient.public_key());
        config.encrypt_body = false;

        let result = encrypt(rendered, &mut [], &config);
        assert!(matches!(result, Err(SecurityError::NothingToEncrypt)));
    }
}
