//! Query-string identity verifier.
//!
//! Trusts the `userId` / `displayName` the client passes when opening the socket.
//! Deployments that issue tokens replace this with their own `IdentityVerifier`.

use async_trait::async_trait;

use crate::domain::{
    AuthError, Credentials, DisplayName, IdentityVerifier, UserId, VerifiedIdentity,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct QueryIdentityVerifier;

impl QueryIdentityVerifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IdentityVerifier for QueryIdentityVerifier {
    async fn verify(&self, credentials: &Credentials) -> Result<VerifiedIdentity, AuthError> {
        let user_id = credentials
            .user_id
            .clone()
            .ok_or(AuthError::MissingUserId)
            .and_then(|id| UserId::new(id).map_err(|_| AuthError::MissingUserId))?;

        let display_name = credentials
            .display_name
            .clone()
            .and_then(|name| DisplayName::new(name).ok())
            .unwrap_or_else(DisplayName::guest);

        Ok(VerifiedIdentity {
            user_id,
            display_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_verify_success() {
        // テスト項目: userId と displayName から身元が確定する
        // given (前提条件):
        let verifier = QueryIdentityVerifier::new();
        let credentials = Credentials {
            user_id: Some("alice".to_string()),
            display_name: Some(" Alice ".to_string()),
            token: None,
        };

        // when (操作):
        let identity = verifier.verify(&credentials).await.unwrap();

        // then (期待する結果):
        assert_eq!(identity.user_id.as_str(), "alice");
        assert_eq!(identity.display_name.as_str(), "Alice");
    }

    #[tokio::test]
    async fn test_verify_defaults_display_name() {
        // テスト項目: 表示名が無い・空の場合は Guest になる
        // given (前提条件):
        let verifier = QueryIdentityVerifier::new();
        let credentials = Credentials {
            user_id: Some("alice".to_string()),
            display_name: Some("   ".to_string()),
            token: None,
        };

        // when (操作):
        let identity = verifier.verify(&credentials).await.unwrap();

        // then (期待する結果):
        assert_eq!(identity.display_name, DisplayName::guest());
    }

    #[tokio::test]
    async fn test_verify_missing_user_id() {
        // テスト項目: userId が無い・空の場合は拒否される
        // given (前提条件):
        let verifier = QueryIdentityVerifier::new();
        let missing = Credentials::default();
        let blank = Credentials {
            user_id: Some("  ".to_string()),
            ..Default::default()
        };

        // when (操作):
        let missing = verifier.verify(&missing).await;
        let blank = verifier.verify(&blank).await;

        // then (期待する結果):
        assert_eq!(missing, Err(AuthError::MissingUserId));
        assert_eq!(blank, Err(AuthError::MissingUserId));
    }
}
