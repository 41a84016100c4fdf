//! Wallet sign-in domain: the SIWE (EIP-4361) message model, single-use
//! nonces, and the credential verifier that ties them together.

pub mod message;
pub mod nonce;
pub mod verifier;

pub use self::message::SignInMessage;
pub use self::nonce::Nonce;
pub use self::verifier::{verify_credential, VerifiedCredential, VerifyError};
