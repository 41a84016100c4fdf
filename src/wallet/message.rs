use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("message is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("statement must be a single line")]
    MultilineStatement,

    #[error("missing issued-at timestamp")]
    MissingIssuedAt,

    #[error("message does not parse as EIP-4361: {0}")]
    Canonical(String),
}

/// The sign-in message as submitted by the browser: a JSON mirror of the
/// structure the wallet tooling serializes before signing.
///
/// Verification depends on every field round-tripping unchanged: the
/// canonical EIP-4361 rendering of these fields must be byte-identical to
/// the text the wallet actually signed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignInMessage {
    pub domain: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    pub uri: String,
    pub version: String,
    pub chain_id: u64,
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
}

impl SignInMessage {
    /// Parse the JSON payload submitted in the `message` credential field.
    ///
    /// # Errors
    /// Returns `MessageError::Json` on malformed JSON or missing fields.
    pub fn from_json(raw: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// The wallet address in EIP-55 checksummed form.
    ///
    /// # Errors
    /// Returns `MessageError::InvalidAddress` if the field is not a 20-byte
    /// hex address.
    pub fn checksum_address(&self) -> Result<String, MessageError> {
        let address: Address = self
            .address
            .parse()
            .map_err(|_| MessageError::InvalidAddress(self.address.clone()))?;
        Ok(address.to_checksum(None))
    }

    /// Render the canonical EIP-4361 text, the exact byte sequence wallets
    /// sign via EIP-191.
    ///
    /// # Errors
    /// Returns an error for an invalid address, a multi-line statement, or a
    /// missing issued-at timestamp.
    pub fn to_canonical(&self) -> Result<String, MessageError> {
        let address = self.checksum_address()?;

        if self
            .statement
            .as_deref()
            .is_some_and(|statement| statement.contains('\n'))
        {
            return Err(MessageError::MultilineStatement);
        }

        let issued_at = self
            .issued_at
            .as_deref()
            .ok_or(MessageError::MissingIssuedAt)?;

        let mut out = format!(
            "{} wants you to sign in with your Ethereum account:\n{address}\n\n",
            self.domain
        );
        if let Some(statement) = &self.statement {
            out.push_str(statement);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&format!(
            "URI: {}\nVersion: {}\nChain ID: {}\nNonce: {}\nIssued At: {issued_at}",
            self.uri, self.version, self.chain_id, self.nonce
        ));
        if let Some(expiration_time) = &self.expiration_time {
            out.push_str(&format!("\nExpiration Time: {expiration_time}"));
        }
        if let Some(not_before) = &self.not_before {
            out.push_str(&format!("\nNot Before: {not_before}"));
        }
        if let Some(request_id) = &self.request_id {
            out.push_str(&format!("\nRequest ID: {request_id}"));
        }
        if !self.resources.is_empty() {
            out.push_str("\nResources:");
            for resource in &self.resources {
                out.push_str(&format!("\n- {resource}"));
            }
        }

        Ok(out)
    }

    /// Render and re-parse through the EIP-4361 grammar, yielding the typed
    /// message used for signature verification.
    ///
    /// # Errors
    /// Returns `MessageError::Canonical` when the rendered text does not
    /// satisfy the grammar (bad URI, bad timestamp format, bad version, ...).
    pub fn parse_canonical(&self) -> Result<siwe::Message, MessageError> {
        let canonical = self.to_canonical()?;
        canonical
            .parse()
            .map_err(|err| MessageError::Canonical(format!("{err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Checksummed form of a well-known mainnet address.
    const ADDRESS: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";

    fn message() -> SignInMessage {
        SignInMessage {
            domain: "localhost:3000".to_string(),
            address: ADDRESS.to_string(),
            statement: Some("Sign in with Ethereum to the app.".to_string()),
            uri: "http://localhost:3000".to_string(),
            version: "1".to_string(),
            chain_id: 1,
            nonce: "aBcDeF1234".to_string(),
            issued_at: Some("2024-05-01T12:00:00.000Z".to_string()),
            expiration_time: None,
            not_before: None,
            request_id: None,
            resources: Vec::new(),
        }
    }

    #[test]
    fn from_json_accepts_browser_payload() -> Result<(), MessageError> {
        let raw = format!(
            r#"{{"domain":"localhost:3000","address":"{ADDRESS}","statement":"Sign in with Ethereum to the app.","uri":"http://localhost:3000","version":"1","chainId":1,"nonce":"aBcDeF1234","issuedAt":"2024-05-01T12:00:00.000Z"}}"#
        );
        let parsed = SignInMessage::from_json(&raw)?;
        assert_eq!(parsed, message());
        Ok(())
    }

    #[test]
    fn from_json_rejects_malformed_payload() {
        assert!(matches!(
            SignInMessage::from_json("not json"),
            Err(MessageError::Json(_))
        ));
        assert!(matches!(
            SignInMessage::from_json(r#"{"domain":"localhost:3000"}"#),
            Err(MessageError::Json(_))
        ));
    }

    #[test]
    fn checksum_address_normalizes_case() -> Result<(), MessageError> {
        let mut message = message();
        message.address = ADDRESS.to_lowercase();
        assert_eq!(message.checksum_address()?, ADDRESS);
        Ok(())
    }

    #[test]
    fn checksum_address_rejects_garbage() {
        let mut message = message();
        message.address = "0x1234".to_string();
        assert!(matches!(
            message.checksum_address(),
            Err(MessageError::InvalidAddress(_))
        ));
    }

    #[test]
    fn canonical_rendering_matches_eip4361() -> Result<(), MessageError> {
        let expected = format!(
            "localhost:3000 wants you to sign in with your Ethereum account:\n\
             {ADDRESS}\n\
             \n\
             Sign in with Ethereum to the app.\n\
             \n\
             URI: http://localhost:3000\n\
             Version: 1\n\
             Chain ID: 1\n\
             Nonce: aBcDeF1234\n\
             Issued At: 2024-05-01T12:00:00.000Z"
        );
        assert_eq!(message().to_canonical()?, expected);
        Ok(())
    }

    #[test]
    fn canonical_rendering_without_statement_keeps_blank_section() -> Result<(), MessageError> {
        let mut message = message();
        message.statement = None;
        let canonical = message.to_canonical()?;
        assert!(canonical.contains(&format!("{ADDRESS}\n\n\nURI: ")));
        Ok(())
    }

    #[test]
    fn canonical_rendering_rejects_multiline_statement() {
        let mut message = message();
        message.statement = Some("line one\nline two".to_string());
        assert!(matches!(
            message.to_canonical(),
            Err(MessageError::MultilineStatement)
        ));
    }

    #[test]
    fn canonical_rendering_requires_issued_at() {
        let mut message = message();
        message.issued_at = None;
        assert!(matches!(
            message.to_canonical(),
            Err(MessageError::MissingIssuedAt)
        ));
    }

    #[test]
    fn parse_canonical_round_trips_fields() -> Result<(), MessageError> {
        let parsed = message().parse_canonical()?;
        assert_eq!(parsed.nonce, "aBcDeF1234");
        assert_eq!(parsed.chain_id, 1);
        assert_eq!(
            parsed.statement.as_deref(),
            Some("Sign in with Ethereum to the app.")
        );
        assert_eq!(
            format!("0x{}", hex::encode(parsed.address)),
            ADDRESS.to_lowercase()
        );
        Ok(())
    }

    #[test]
    fn parse_canonical_accepts_statement_less_messages() -> Result<(), MessageError> {
        let mut message = message();
        message.statement = None;
        let parsed = message.parse_canonical()?;
        assert_eq!(parsed.statement, None);
        Ok(())
    }

    #[test]
    fn parse_canonical_rejects_bad_timestamp() {
        let mut message = message();
        message.issued_at = Some("yesterday".to_string());
        assert!(matches!(
            message.parse_canonical(),
            Err(MessageError::Canonical(_))
        ));
    }

    #[test]
    fn parse_canonical_rejects_unsupported_version() {
        let mut message = message();
        message.version = "2".to_string();
        assert!(matches!(
            message.parse_canonical(),
            Err(MessageError::Canonical(_))
        ));
    }
}
