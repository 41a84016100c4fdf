//! # Firma (SIWE Credential Service)
//!
//! `firma` is the server half of a Sign-In with Ethereum (EIP-4361) flow.
//! A browser fetches a single-use nonce, asks the connected wallet to sign a
//! structured sign-in message embedding that nonce, and submits the signed
//! message back. `firma` verifies the signature against the claimed wallet
//! address, binds the message to the previously issued nonce, maps the
//! verified address to a persisted account (creating one on first sign-in)
//! and issues a cookie-backed session carrying the account id.
//!
//! ## Verification contract
//!
//! Every failure path collapses to a plain denial at the HTTP boundary; only
//! logs distinguish a malformed message from a stale nonce or a bad
//! signature. The anti-replay property rests on two checks:
//!
//! 1. the nonce embedded in the signed message must equal the nonce bound to
//!    the browser session (cookie), compared by exact string equality, and
//! 2. the stored nonce row is consumed with a guarded `UPDATE .. RETURNING`,
//!    so a nonce verifies at most once even under concurrent submissions.
//!
//! ## Storage
//!
//! `PostgreSQL` holds users, their linked provider accounts, issued nonces
//! (hashed, with TTL and request metadata) and sessions (hashed tokens).
//! The bootstrap schema lives in `db/sql/01_firma.sql`.

pub mod api;
pub mod cli;
pub mod wallet;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
