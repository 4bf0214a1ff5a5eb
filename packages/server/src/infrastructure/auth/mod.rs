//! IdentityVerifier の実装

mod query;

pub use query::QueryIdentityVerifier;
