//! Collection naming and user id validation.
//!
//! Every user's uploads live in their own collection, `user_<id>`. The
//! shared legal knowledge base lives in a single configured collection
//! (default [`DEFAULT_SHARED_COLLECTION`]).

use anyhow::{bail, Result};

/// Default name of the shared legal knowledge base collection.
pub const DEFAULT_SHARED_COLLECTION: &str = "legal_index";

/// Prefix of every per-user collection.
pub const USER_COLLECTION_PREFIX: &str = "user_";

/// Check that `user_id` is non-empty and contains only ASCII alphanumerics,
/// `-`, `_` or `.`.
///
/// Restricting the alphabet keeps `user_<id>` an unambiguous isolation key
/// and safe to use as a file name for status artifacts.
pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.is_empty() {
        bail!("user id must not be empty");
    }
    if let Some(bad) = user_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        bail!("user id '{}' contains invalid character '{}'", user_id, bad);
    }
    if user_id == "." || user_id == ".." {
        bail!("user id '{}' is reserved", user_id);
    }
    Ok(())
}

/// Name of the collection holding `user_id`'s documents.
///
/// ```rust
/// use lexctx_core::collection::user_collection;
///
/// assert_eq!(user_collection("alice").unwrap(), "user_alice");
/// assert!(user_collection("../etc").is_err());
/// ```
pub fn user_collection(user_id: &str) -> Result<String> {
    validate_user_id(user_id)?;
    Ok(format!("{}{}", USER_COLLECTION_PREFIX, user_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_ids() {
        for id in ["alice", "u-42", "team_a.legal", "7"] {
            assert!(validate_user_id(id).is_ok(), "{id}");
        }
    }

    #[test]
    fn rejects_empty_and_unsafe_ids() {
        for id in ["", "a b", "a/b", "..", ".", "x\u{0}", "ünï"] {
            assert!(validate_user_id(id).is_err(), "{id:?}");
        }
    }

    #[test]
    fn distinct_users_get_distinct_collections() {
        let a = user_collection("alice").unwrap();
        let b = user_collection("bob").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, DEFAULT_SHARED_COLLECTION);
    }
}
