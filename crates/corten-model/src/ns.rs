//! Namespace URIs and wire names for the ebMS3 / WS-Security envelope.
//!
//! These strings are part of the interoperability contract and must not
//! drift: peers match on them byte-for-byte.

/// ebMS3 core namespace.
pub const EBMS: &str = "http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/";
/// SOAP 1.1 envelope namespace.
pub const SOAP11: &str = "http://schemas.xmlsoap.org/soap/envelope/";
/// SOAP 1.2 envelope namespace.
pub const SOAP12: &str = "http://www.w3.org/2003/05/soap-envelope";
/// WS-Security security extension namespace.
pub const WSSE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
/// WS-Security utility namespace (wsu:Id).
pub const WSU: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
/// XML digital signature namespace.
pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";
/// XML encryption namespace.
pub const XENC: &str = "http://www.w3.org/2001/04/xmlenc#";
/// ebBP signals namespace (non-repudiation information).
pub const EBBP: &str = "http://docs.oasis-open.org/ebxml-bp/ebbp-signals-2.0";

/// Conventional prefixes used by the writer. Readers must never rely on
/// prefixes, only on namespace URIs.
pub mod prefix {
    pub const EBMS: &str = "eb";
    pub const ENV: &str = "env";
    pub const WSSE: &str = "wsse";
    pub const WSU: &str = "wsu";
    pub const DSIG: &str = "ds";
    pub const XENC: &str = "xenc";
    pub const EBBP: &str = "ebbp";
}

/// Element local names.
pub mod node {
    pub const ENVELOPE: &str = "Envelope";
    pub const HEADER: &str = "Header";
    pub const BODY: &str = "Body";

    pub const MESSAGING: &str = "Messaging";
    pub const USER_MESSAGE: &str = "UserMessage";
    pub const SIGNAL_MESSAGE: &str = "SignalMessage";
    pub const MESSAGE_INFO: &str = "MessageInfo";
    pub const TIMESTAMP: &str = "Timestamp";
    pub const MESSAGE_ID: &str = "MessageId";
    pub const REF_TO_MESSAGE_ID: &str = "RefToMessageId";
    pub const PARTY_INFO: &str = "PartyInfo";
    pub const FROM: &str = "From";
    pub const TO: &str = "To";
    pub const PARTY_ID: &str = "PartyId";
    pub const ROLE: &str = "Role";
    pub const COLLABORATION_INFO: &str = "CollaborationInfo";
    pub const AGREEMENT_REF: &str = "AgreementRef";
    pub const SERVICE: &str = "Service";
    pub const ACTION: &str = "Action";
    pub const CONVERSATION_ID: &str = "ConversationId";
    pub const MESSAGE_PROPERTIES: &str = "MessageProperties";
    pub const PROPERTY: &str = "Property";
    pub const PAYLOAD_INFO: &str = "PayloadInfo";
    pub const PART_INFO: &str = "PartInfo";
    pub const PART_PROPERTIES: &str = "PartProperties";
    pub const RECEIPT: &str = "Receipt";
    pub const ERROR: &str = "Error";
    pub const DESCRIPTION: &str = "Description";
    pub const ERROR_DETAIL: &str = "ErrorDetail";
    pub const PULL_REQUEST: &str = "PullRequest";

    pub const SECURITY: &str = "Security";
    pub const SIGNATURE: &str = "Signature";
    pub const SIGNED_INFO: &str = "SignedInfo";
    pub const CANONICALIZATION_METHOD: &str = "CanonicalizationMethod";
    pub const SIGNATURE_METHOD: &str = "SignatureMethod";
    pub const REFERENCE: &str = "Reference";
    pub const DIGEST_METHOD: &str = "DigestMethod";
    pub const DIGEST_VALUE: &str = "DigestValue";
    pub const SIGNATURE_VALUE: &str = "SignatureValue";
    pub const KEY_INFO: &str = "KeyInfo";
    pub const KEY_VALUE: &str = "KeyValue";
    pub const KEY_NAME: &str = "KeyName";
    pub const BINARY_SECURITY_TOKEN: &str = "BinarySecurityToken";
    pub const SECURITY_TOKEN_REFERENCE: &str = "SecurityTokenReference";
    pub const KEY_IDENTIFIER: &str = "KeyIdentifier";
    pub const ENCRYPTED_KEY: &str = "EncryptedKey";
    pub const ENCRYPTED_DATA: &str = "EncryptedData";
    pub const ENCRYPTION_METHOD: &str = "EncryptionMethod";
    pub const AGREEMENT_METHOD: &str = "AgreementMethod";
    pub const ORIGINATOR_KEY_INFO: &str = "OriginatorKeyInfo";
    pub const RECIPIENT_KEY_INFO: &str = "RecipientKeyInfo";
    pub const CIPHER_DATA: &str = "CipherData";
    pub const CIPHER_VALUE: &str = "CipherValue";
    pub const DATA_REFERENCE: &str = "DataReference";
    pub const REFERENCE_LIST: &str = "ReferenceList";

    pub const NON_REPUDIATION_INFORMATION: &str = "NonRepudiationInformation";
    pub const MESSAGE_PART_NR_INFORMATION: &str = "MessagePartNRInformation";
}

/// Attribute names.
pub mod attr {
    pub const ID: &str = "Id";
    pub const WSU_ID: &str = "wsu:Id";
    pub const MUST_UNDERSTAND: &str = "mustUnderstand";
    pub const TYPE: &str = "type";
    pub const NAME: &str = "name";
    pub const HREF: &str = "href";
    pub const MPC: &str = "mpc";
    pub const PMODE: &str = "pmode";
    pub const ERROR_CODE: &str = "errorCode";
    pub const SEVERITY: &str = "severity";
    pub const SHORT_DESCRIPTION: &str = "shortDescription";
    pub const CATEGORY: &str = "category";
    pub const REF_TO_MESSAGE_IN_ERROR: &str = "refToMessageInError";
    pub const URI: &str = "URI";
    pub const ALGORITHM: &str = "Algorithm";
    pub const VALUE_TYPE: &str = "ValueType";
    pub const ENCODING_TYPE: &str = "EncodingType";
    pub const XML_LANG: &str = "xml:lang";
}
