use serde::{Deserialize, Serialize};

/// The authenticated identity that scopes remote sync.
///
/// Persisted verbatim in the session slot as `{"id": .., "email": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned user id, sent as `X-User-Id`
    pub id: i64,
    /// Normalized (trimmed, lowercase) email
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_slot_format() {
        let user = User {
            id: 12,
            email: "a@b.c".into(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert_eq!(json, r#"{"id":12,"email":"a@b.c"}"#);
        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
    }
}
