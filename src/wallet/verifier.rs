use super::message::{MessageError, SignInMessage};
use thiserror::Error;
use tracing::debug;

/// Why a credential was rejected.
///
/// Callers collapse every variant into a uniform denial; the distinction
/// only ever reaches the logs.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("malformed sign-in message: {0}")]
    MalformedMessage(#[from] MessageError),

    #[error("no nonce bound to the current session")]
    MissingNonce,

    #[error("signature does not match the claimed address")]
    InvalidSignature,

    #[error("message domain does not match the service domain")]
    DomainMismatch,

    #[error("message nonce does not match the session nonce")]
    NonceMismatch,

    #[error("storage failure")]
    Storage(anyhow::Error),
}

/// Outcome of a successful verification: the claimed address, proven by the
/// signature, plus the nonce the message consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCredential {
    /// EIP-55 checksummed wallet address.
    pub address: String,
    pub nonce: String,
}

/// Verify a submitted `{message, signature}` credential against the nonce
/// bound to the current browser session.
///
/// Checks run in a fixed order: parse, session-nonce presence, optional
/// domain binding, validity window + EIP-191 signature recovery, and exact
/// nonce equality. The nonce equality check is the anti-replay gate: a
/// perfectly signed message with a stale or foreign nonce never verifies.
///
/// The session nonce is an explicit argument rather than ambient state so
/// the verifier stays testable in isolation; consuming the stored nonce is
/// the caller's job.
///
/// # Errors
/// Returns the matching `VerifyError`; callers must treat every variant as
/// the same denial.
pub fn verify_credential(
    raw_message: &str,
    signature: &str,
    session_nonce: Option<&str>,
    expected_domain: Option<&str>,
) -> Result<VerifiedCredential, VerifyError> {
    let message = SignInMessage::from_json(raw_message)?;
    let parsed = message.parse_canonical()?;

    let session_nonce = session_nonce.ok_or(VerifyError::MissingNonce)?;

    if let Some(expected) = expected_domain {
        if parsed.domain.as_str() != expected {
            return Err(VerifyError::DomainMismatch);
        }
    }

    if !parsed.valid_now() {
        debug!("message is outside its validity window");
        return Err(VerifyError::InvalidSignature);
    }

    let signature = decode_signature(signature)?;
    parsed.verify_eip191(&signature).map_err(|err| {
        debug!("EIP-191 signature verification failed: {err}");
        VerifyError::InvalidSignature
    })?;

    if message.nonce != session_nonce {
        return Err(VerifyError::NonceMismatch);
    }

    Ok(VerifiedCredential {
        address: message.checksum_address()?,
        nonce: message.nonce,
    })
}

// 65 bytes: r || s || v, usually 0x-prefixed hex on the wire.
fn decode_signature(signature: &str) -> Result<[u8; 65], VerifyError> {
    let hex_part = signature.strip_prefix("0x").unwrap_or(signature);
    let bytes = hex::decode(hex_part).map_err(|_| VerifyError::InvalidSignature)?;
    bytes.try_into().map_err(|_| VerifyError::InvalidSignature)
}
