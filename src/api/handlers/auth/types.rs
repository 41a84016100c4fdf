//! Request/response types for the auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Credential submission: the JSON-serialized sign-in message plus the
/// wallet's hex signature over its canonical rendering.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyRequest {
    pub message: String,
    pub signature: String,
}

/// The verified identity: the account's internal id, never the raw address.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyResponse {
    pub id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct NonceResponse {
    pub nonce: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionUser {
    pub id: String,
    pub address: String,
}

/// Materialized session: identity nested under `user`, remaining fields
/// passed through from the stored record.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub user: SessionUser,
    pub expires_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn verify_request_round_trips() -> Result<()> {
        let request = VerifyRequest {
            message: r#"{"domain":"localhost:3000"}"#.to_string(),
            signature: "0x00".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let signature = value
            .get("signature")
            .and_then(serde_json::Value::as_str)
            .context("missing signature")?;
        assert_eq!(signature, "0x00");
        let decoded: VerifyRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.message, request.message);
        Ok(())
    }

    #[test]
    fn session_response_nests_identity_under_user() -> Result<()> {
        let response = SessionResponse {
            user: SessionUser {
                id: "018f0000-0000-7000-8000-000000000000".to_string(),
                address: "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".to_string(),
            },
            expires_at: "2026-01-01T00:00:00+00:00".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        let id = value
            .pointer("/user/id")
            .and_then(serde_json::Value::as_str)
            .context("missing user.id")?;
        assert_eq!(id, "018f0000-0000-7000-8000-000000000000");
        Ok(())
    }
}
