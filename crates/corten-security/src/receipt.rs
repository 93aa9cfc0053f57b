//! Receipt construction for processed inbound messages.

use corten_model::{
    Message, MessageIdGenerator, MessageInfo, NonRepudiationInformation, Receipt, SignedReference,
    SoapVersion,
};

use crate::error::SecurityError;

/// Build the acknowledgement signal for a processed inbound message.
///
/// When the original was signed and `non_repudiation` is requested, the
/// receipt echoes the verified signature's references so the sender can
/// later prove which exact bytes were acknowledged. Unsigned originals
/// always get the empty form; there is nothing to echo.
pub fn build_receipt(
    soap_version: SoapVersion,
    id_gen: &MessageIdGenerator,
    ref_to_message_id: &str,
    signed_references: &[SignedReference],
    non_repudiation: bool,
) -> Result<Message, SecurityError> {
    let info = MessageInfo::in_reply_to(id_gen.mint(), ref_to_message_id)?;
    let receipt = if non_repudiation && !signed_references.is_empty() {
        tracing::debug!(
            ref_to = ref_to_message_id,
            parts = signed_references.len(),
            "built non-repudiation receipt"
        );
        Receipt::non_repudiation(NonRepudiationInformation::new(signed_references.to_vec())?)
    } else {
        Receipt::empty()
    };
    Ok(Message::receipt(soap_version, info, receipt))
}
