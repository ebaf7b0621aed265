//! Branded identifier newtypes.
//!
//! Each ID wraps a `String` so the type system keeps sessions, turns,
//! messages and contexts apart. Fresh IDs are UUID v7 (time-ordered) with a
//! short prefix, e.g. `sess_0190…`.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh, time-ordered identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            /// Borrow the raw string form.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID, returning the raw string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

branded_id!(
    /// Identifies one chat session (one conversation).
    SessionId,
    "sess"
);
branded_id!(
    /// Identifies one user turn within a session.
    TurnId,
    "turn"
);
branded_id!(
    /// Identifies one transcript entry.
    MessageId,
    "msg"
);
branded_id!(
    /// Identifies one [`DocumentContext`](crate::models::DocumentContext).
    ContextId,
    "ctx"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_carry_prefix() {
        assert!(SessionId::new().as_str().starts_with("sess_"));
        assert!(TurnId::new().as_str().starts_with("turn_"));
        assert!(MessageId::new().as_str().starts_with("msg_"));
        assert!(ContextId::new().as_str().starts_with("ctx_"));
    }

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn from_str_preserves_value() {
        let id = SessionId::from("custom");
        assert_eq!(id.as_str(), "custom");
        assert_eq!(id.to_string(), "custom");
    }

    #[test]
    fn serializes_transparently() {
        let id = ContextId::from("ctx_1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"ctx_1\"");
        let back: ContextId = serde_json::from_str("\"ctx_1\"").unwrap();
        assert_eq!(back, id);
    }
}
