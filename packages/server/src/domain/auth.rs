//! 接続時の身元確認
//!
//! 認証そのものは外部の関心事です。コアは検証済みの `{userId, displayName}` のみを受け取ります。

use async_trait::async_trait;

use super::{AuthError, DisplayName, UserId};

/// 接続時にクライアントが提示する資格情報
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub token: Option<String>,
}

/// 検証済みの身元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub user_id: UserId,
    pub display_name: DisplayName,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credentials: &Credentials) -> Result<VerifiedIdentity, AuthError>;
}
