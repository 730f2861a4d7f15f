//! Durable server-side sessions.
//!
//! `SessionHandler` is the storage protocol (open/close/read/write/destroy/gc);
//! `PgSessionStore` and `MemorySessionStore` implement it. Above that,
//! `SessionManager` turns stored bytes into a `Session` handle for the
//! request and writes it back when the request is done.

pub mod data;
pub mod error;
pub mod gc;
pub mod manager;
pub mod memory;
pub mod store;

pub use data::SessionData;
pub use error::SessionError;
pub use gc::spawn_gc;
pub use manager::{CommitOutcome, Session, SessionManager};
pub use memory::MemorySessionStore;
pub use store::{PgSessionStore, SessionHandler, DEFAULT_SESSION_TABLE};

use rand::RngCore;

/// Length in bytes of session ids and CSRF tokens before hex encoding
pub const TOKEN_BYTES: usize = 32;

/// Hex string of `bytes` random bytes from the thread-local CSPRNG
pub(crate) fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

pub(crate) fn generate_id() -> String {
    random_hex(TOKEN_BYTES)
}

pub(crate) fn is_well_formed_id(id: &str) -> bool {
    id.len() == TOKEN_BYTES * 2 && id.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_64_hex_chars_and_distinct() {
        let a = generate_id();
        let b = generate_id();
        assert!(is_well_formed_id(&a));
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(!is_well_formed_id(""));
        assert!(!is_well_formed_id("abc"));
        assert!(!is_well_formed_id(&"z".repeat(64)));
    }
}
