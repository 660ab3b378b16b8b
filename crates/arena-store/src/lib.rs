//! Arena Store
//!
//! Core primitives shared by the Arena Clash service:
//! - Versioned document store with optimistic, all-or-nothing transactions
//! - Money amounts in paise
//! - HMAC signing for gateway webhooks

mod money;
mod signature;
mod store;

pub use money::{Money, MoneyParseError};
pub use signature::{sign_payload, verify_signature};
pub use store::{
    Backend, MemoryBackend, Precondition, Store, StoreError, Transaction, Versioned, Write,
    MAX_ATTEMPTS,
};

/// Join path segments into a document or collection path
///
/// `doc_path(&["tournaments", "t1", "participants", "u1"])` gives
/// `tournaments/t1/participants/u1`.
pub fn doc_path(segments: &[&str]) -> String {
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_path() {
        assert_eq!(doc_path(&["users", "u1"]), "users/u1");
        assert_eq!(
            doc_path(&["tournaments", "t1", "participants", "u1"]),
            "tournaments/t1/participants/u1"
        );
    }
}
