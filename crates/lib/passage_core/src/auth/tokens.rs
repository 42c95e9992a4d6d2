//! JWT token engine: generation, validation, refresh rotation and revocation.
//!
//! Tokens are HS256 JWTs (`header.payload.signature`, base64url). The signing
//! secret is injected by the caller and never generated here.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use tracing::{debug, info};

use super::TokenError;
use super::revocation::RevocationStore;
use crate::models::auth::{TOKEN_TYPE_BEARER, TokenClaims, TokenKind, TokenPair};

/// Access token lifetime: 1 hour.
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 60 * 60;

/// Refresh token lifetime: 30 days.
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 30 * 24 * 60 * 60;

pub const DEFAULT_ISSUER: &str = "passage";
pub const DEFAULT_AUDIENCE: &str = "passage-client";

/// Token engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenConfig {
    pub access_ttl_secs: i64,
    /// Also the TTL of every revocation entry.
    pub refresh_ttl_secs: i64,
    pub issuer: String,
    pub audience: String,
    /// Revoke the presented refresh token when it is exchanged.
    pub single_use_refresh: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            single_use_refresh: false,
        }
    }
}

/// Mints and verifies session tokens and maintains the revocation denylist.
///
/// Cheap to clone; clones share the revocation store.
#[derive(Clone)]
pub struct TokenEngine {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: TokenConfig,
    revocations: Arc<dyn RevocationStore>,
}

impl fmt::Debug for TokenEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TokenEngine {
    pub fn new(secret: &[u8], config: TokenConfig, revocations: Arc<dyn RevocationStore>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            config,
            revocations,
        }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Issue a fresh access/refresh pair for `user_id`.
    ///
    /// The refresh token records the access token's `jti` so that refreshing
    /// can revoke it.
    pub fn generate(&self, user_id: i64, roles: &[String]) -> Result<TokenPair, TokenError> {
        let now = Utc::now().timestamp();
        let access_exp = expiry(now, self.config.access_ttl_secs)?;
        let refresh_exp = expiry(now, self.config.refresh_ttl_secs)?;
        let access_jti = new_jti();

        let access = TokenClaims {
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            iat: now,
            nbf: now,
            exp: access_exp,
            jti: access_jti.clone(),
            sub: user_id.to_string(),
            roles: roles.to_vec(),
            kind: TokenKind::Access,
            access_jti: None,
        };

        let refresh = TokenClaims {
            exp: refresh_exp,
            jti: new_jti(),
            kind: TokenKind::Refresh,
            access_jti: Some(access_jti),
            ..access.clone()
        };

        let pair = TokenPair {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
            expires_in: self.config.access_ttl_secs,
            token_type: TOKEN_TYPE_BEARER.to_string(),
        };
        debug!(user_id, access_jti = %access.jti, refresh_jti = %refresh.jti, "issued token pair");
        Ok(pair)
    }

    /// Verify signature, time bounds and revocation state, in that order.
    pub async fn validate(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let claims = self.decode(token)?;
        if self.revocations.is_revoked(&claims.jti).await? {
            return Err(TokenError::Revoked);
        }
        Ok(claims)
    }

    /// Exchange a refresh token for a brand-new pair carrying the roles
    /// recorded in the refresh token.
    ///
    /// The access token issued alongside the refresh token is revoked first.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TokenError> {
        let claims = self.check_refresh(refresh_token).await?;
        let roles = claims.roles.clone();
        self.rotate(&claims, &roles).await
    }

    /// Validate a refresh token without rotating it.
    ///
    /// The returned claims always carry a numeric subject.
    pub async fn check_refresh(&self, refresh_token: &str) -> Result<TokenClaims, TokenError> {
        let check = async {
            let claims = self.validate(refresh_token).await?;
            if claims.kind != TokenKind::Refresh || claims.user_id().is_none() {
                return Err(TokenError::InvalidRefreshToken);
            }
            Ok(claims)
        };
        check.await.map_err(|e| TokenError::RefreshFailed(Box::new(e)))
    }

    /// Rotate checked refresh claims into a new pair issued with `roles`.
    pub async fn rotate(
        &self,
        claims: &TokenClaims,
        roles: &[String],
    ) -> Result<TokenPair, TokenError> {
        self.rotate_inner(claims, roles)
            .await
            .map_err(|e| TokenError::RefreshFailed(Box::new(e)))
    }

    /// Deny a token for the rest of its lifetime. Revoking twice is a no-op.
    pub async fn revoke(&self, token: &str) -> Result<(), TokenError> {
        let claims = self
            .decode(token)
            .map_err(|e| TokenError::RevokeFailed(Box::new(e)))?;
        self.revoke_jti(&claims.jti)
            .await
            .map_err(|e| TokenError::RevokeFailed(Box::new(e)))?;
        info!(jti = %claims.jti, kind = ?claims.kind, "token revoked");
        Ok(())
    }

    /// Fail-closed revocation check: anything that cannot be verified counts as revoked.
    pub async fn is_revoked(&self, token: &str) -> bool {
        let Ok(claims) = self.decode(token) else {
            return true;
        };
        self.revocations
            .is_revoked(&claims.jti)
            .await
            .unwrap_or(true)
    }

    async fn rotate_inner(
        &self,
        claims: &TokenClaims,
        roles: &[String],
    ) -> Result<TokenPair, TokenError> {
        if claims.kind != TokenKind::Refresh {
            return Err(TokenError::InvalidRefreshToken);
        }
        let user_id = claims.user_id().ok_or(TokenError::InvalidRefreshToken)?;

        if let Some(access_jti) = &claims.access_jti {
            self.revoke_jti(access_jti).await?;
        }
        if self.config.single_use_refresh {
            self.revoke_jti(&claims.jti).await?;
        }

        let pair = self.generate(user_id, roles)?;
        info!(user_id, "token pair refreshed");
        Ok(pair)
    }

    /// Every entry uses the refresh lifetime, which covers both token kinds.
    async fn revoke_jti(&self, jti: &str) -> Result<(), TokenError> {
        let ttl = Duration::from_secs(self.config.refresh_ttl_secs.max(0) as u64);
        self.revocations.revoke(jti, ttl).await?;
        Ok(())
    }

    /// Signature and claim checks without consulting the denylist.
    fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(map_jwt_error)?;
        if data.claims.user_id().is_none() {
            return Err(TokenError::Invalid("subject is not a user id".into()));
        }
        Ok(data.claims)
    }

    fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Encode(format!("jwt encode: {e}")))
    }
}

fn expiry(now: i64, ttl_secs: i64) -> Result<i64, TokenError> {
    now.checked_add(ttl_secs)
        .ok_or_else(|| TokenError::Encode(format!("token lifetime {ttl_secs}s overflows exp")))
}

/// 128 random bits, lowercase hex.
fn new_jti() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::ImmatureSignature => TokenError::NotYetValid,
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        ErrorKind::InvalidIssuer => TokenError::Invalid("issuer mismatch".into()),
        ErrorKind::InvalidAudience => TokenError::Invalid("audience mismatch".into()),
        ErrorKind::MissingRequiredClaim(claim) => {
            TokenError::Invalid(format!("missing claim: {claim}"))
        }
        _ => TokenError::Invalid(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    use super::*;
    use crate::auth::revocation::InMemoryRevocationStore;
    use crate::users::StoreError;

    const SECRET: &[u8] = b"test-secret-test-secret-test-secret";

    fn engine() -> TokenEngine {
        engine_with(TokenConfig::default())
    }

    fn engine_with(config: TokenConfig) -> TokenEngine {
        TokenEngine::new(SECRET, config, Arc::new(InMemoryRevocationStore::new()))
    }

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|r| r.to_string()).collect()
    }

    fn claims_at(engine: &TokenEngine, nbf: i64, exp: i64) -> TokenClaims {
        TokenClaims {
            iss: engine.config.issuer.clone(),
            aud: engine.config.audience.clone(),
            iat: nbf,
            nbf,
            exp,
            jti: new_jti(),
            sub: "5".into(),
            roles: vec![],
            kind: TokenKind::Access,
            access_jti: None,
        }
    }

    /// Store whose every call fails.
    struct BrokenStore;

    #[async_trait]
    impl RevocationStore for BrokenStore {
        async fn revoke(&self, _jti: &str, _ttl: Duration) -> Result<(), StoreError> {
            Err(StoreError::Backend("unreachable".into()))
        }

        async fn is_revoked(&self, _jti: &str) -> Result<bool, StoreError> {
            Err(StoreError::Backend("unreachable".into()))
        }
    }

    #[tokio::test]
    async fn access_token_round_trips_subject_and_roles() {
        let engine = engine();
        let pair = engine.generate(42, &roles(&["ADMIN", "USER"])).unwrap();

        let claims = engine.validate(&pair.access_token).await.unwrap();
        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.roles, roles(&["ADMIN", "USER"]));
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.iss, DEFAULT_ISSUER);
        assert_eq!(claims.aud, DEFAULT_AUDIENCE);
        assert_eq!(claims.nbf, claims.iat);
        assert_eq!(claims.exp - claims.iat, DEFAULT_ACCESS_TTL_SECS);
        assert_eq!(pair.expires_in, DEFAULT_ACCESS_TTL_SECS);
        assert_eq!(pair.token_type, "bearer");
    }

    #[tokio::test]
    async fn refresh_token_links_access_jti() {
        let engine = engine();
        let pair = engine.generate(1, &roles(&["USER"])).unwrap();

        let access = engine.validate(&pair.access_token).await.unwrap();
        let refresh = engine.validate(&pair.refresh_token).await.unwrap();
        assert_eq!(refresh.kind, TokenKind::Refresh);
        assert_eq!(refresh.access_jti.as_deref(), Some(access.jti.as_str()));
        assert_ne!(refresh.jti, access.jti);
        assert_eq!(refresh.exp - refresh.iat, DEFAULT_REFRESH_TTL_SECS);
    }

    #[test]
    fn jti_is_128_bit_hex() {
        let a = new_jti();
        let b = new_jti();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, b);
    }

    #[test]
    fn token_has_three_segments() {
        let pair = engine().generate(1, &[]).unwrap();
        assert_eq!(pair.access_token.split('.').count(), 3);
        let header = pair.access_token.split('.').next().unwrap();
        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header).unwrap()).unwrap();
        assert_eq!(header["alg"], "HS256");
    }

    #[tokio::test]
    async fn revoking_access_leaves_refresh_valid() {
        let engine = engine();
        let pair = engine.generate(7, &roles(&["USER"])).unwrap();

        engine.revoke(&pair.access_token).await.unwrap();

        let err = engine.validate(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, TokenError::Revoked), "{err:?}");
        assert!(engine.validate(&pair.refresh_token).await.is_ok());
        assert!(engine.is_revoked(&pair.access_token).await);
        assert!(!engine.is_revoked(&pair.refresh_token).await);
    }

    #[tokio::test]
    async fn refresh_revokes_linked_access_token() {
        let engine = engine();
        let pair = engine.generate(7, &roles(&["USER"])).unwrap();

        let next = engine.refresh(&pair.refresh_token).await.unwrap();

        let err = engine.validate(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, TokenError::Revoked), "{err:?}");

        let claims = engine.validate(&next.access_token).await.unwrap();
        assert_eq!(claims.user_id(), Some(7));
        assert_eq!(claims.roles, roles(&["USER"]));
        assert_ne!(next.access_token, pair.access_token);
        assert_ne!(next.refresh_token, pair.refresh_token);
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens() {
        let engine = engine();
        let pair = engine.generate(7, &[]).unwrap();

        let err = engine.refresh(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, TokenError::RefreshFailed(_)), "{err:?}");
        assert!(matches!(err.cause(), TokenError::InvalidRefreshToken), "{err:?}");
        // The access token itself is untouched.
        assert!(engine.validate(&pair.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn rotate_issues_the_supplied_roles() {
        let engine = engine();
        let pair = engine.generate(7, &roles(&["ADMIN", "USER"])).unwrap();

        let checked = engine.check_refresh(&pair.refresh_token).await.unwrap();
        assert_eq!(checked.roles, roles(&["ADMIN", "USER"]));

        let next = engine.rotate(&checked, &roles(&["USER"])).await.unwrap();
        let claims = engine.validate(&next.access_token).await.unwrap();
        assert_eq!(claims.roles, roles(&["USER"]));
        assert!(matches!(
            engine.validate(&pair.access_token).await,
            Err(TokenError::Revoked)
        ));
    }

    #[test]
    fn overflowing_lifetime_is_an_error_not_a_panic() {
        let engine = engine_with(TokenConfig {
            refresh_ttl_secs: i64::MAX,
            ..TokenConfig::default()
        });
        let err = engine.generate(7, &[]).unwrap_err();
        assert!(matches!(err, TokenError::Encode(_)), "{err:?}");
    }

    #[tokio::test]
    async fn refresh_wraps_validation_failures() {
        let err = engine().refresh("not.a.token").await.unwrap_err();
        assert!(matches!(err, TokenError::RefreshFailed(_)));
        assert!(matches!(err.cause(), TokenError::Invalid(_)), "{err:?}");
    }

    #[tokio::test]
    async fn refresh_token_is_reusable_by_default() {
        let engine = engine();
        let pair = engine.generate(7, &[]).unwrap();
        engine.refresh(&pair.refresh_token).await.unwrap();
        assert!(engine.refresh(&pair.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn single_use_refresh_rejects_replay() {
        let engine = engine_with(TokenConfig {
            single_use_refresh: true,
            ..TokenConfig::default()
        });
        let pair = engine.generate(7, &[]).unwrap();
        engine.refresh(&pair.refresh_token).await.unwrap();

        let err = engine.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err.cause(), TokenError::Revoked), "{err:?}");
    }

    #[tokio::test]
    async fn revoke_twice_is_a_noop() {
        let engine = engine();
        let pair = engine.generate(7, &[]).unwrap();
        engine.revoke(&pair.refresh_token).await.unwrap();
        engine.revoke(&pair.refresh_token).await.unwrap();
        assert!(engine.is_revoked(&pair.refresh_token).await);
    }

    #[tokio::test]
    async fn expired_token_reports_expiry() {
        let engine = engine();
        let now = Utc::now().timestamp();
        let token = engine.sign(&claims_at(&engine, now - 100, now - 10)).unwrap();

        let err = engine.validate(&token).await.unwrap_err();
        assert!(matches!(err, TokenError::Expired), "{err:?}");
        assert!(engine.is_revoked(&token).await);

        let err = engine.revoke(&token).await.unwrap_err();
        assert!(matches!(err, TokenError::RevokeFailed(_)));
        assert!(matches!(err.cause(), TokenError::Expired));
    }

    #[tokio::test]
    async fn expired_and_revoked_token_reports_expiry() {
        let engine = engine();
        let now = Utc::now().timestamp();
        let claims = claims_at(&engine, now - 100, now - 10);
        engine.revoke_jti(&claims.jti).await.unwrap();
        let token = engine.sign(&claims).unwrap();

        let err = engine.validate(&token).await.unwrap_err();
        assert!(matches!(err, TokenError::Expired), "{err:?}");
    }

    #[tokio::test]
    async fn future_token_is_not_yet_valid() {
        let engine = engine();
        let now = Utc::now().timestamp();
        let token = engine.sign(&claims_at(&engine, now + 300, now + 600)).unwrap();

        let err = engine.validate(&token).await.unwrap_err();
        assert!(matches!(err, TokenError::NotYetValid), "{err:?}");
    }

    #[tokio::test]
    async fn token_from_other_secret_has_bad_signature() {
        let other = TokenEngine::new(
            b"another-secret",
            TokenConfig::default(),
            Arc::new(InMemoryRevocationStore::new()),
        );
        let pair = other.generate(7, &[]).unwrap();

        let err = engine().validate(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, TokenError::InvalidSignature), "{err:?}");
    }

    #[tokio::test]
    async fn tampered_payload_has_bad_signature() {
        let engine = engine();
        let pair = engine.generate(7, &roles(&["USER"])).unwrap();
        let parts: Vec<&str> = pair.access_token.split('.').collect();

        let mut payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        payload["roles"] = serde_json::json!(["ADMIN"]);
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        let err = engine.validate(&forged).await.unwrap_err();
        assert!(matches!(err, TokenError::InvalidSignature), "{err:?}");
    }

    #[tokio::test]
    async fn audience_mismatch_is_invalid() {
        let issuer = engine_with(TokenConfig {
            audience: "someone-else".into(),
            ..TokenConfig::default()
        });
        let pair = issuer.generate(7, &[]).unwrap();

        let err = engine().validate(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)), "{err:?}");
    }

    #[tokio::test]
    async fn non_numeric_subject_is_invalid() {
        let engine = engine();
        let now = Utc::now().timestamp();
        let mut claims = claims_at(&engine, now, now + 60);
        claims.sub = "alice".into();
        let token = engine.sign(&claims).unwrap();

        let err = engine.validate(&token).await.unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)), "{err:?}");
    }

    #[tokio::test]
    async fn garbage_is_invalid_and_counts_as_revoked() {
        let engine = engine();
        let err = engine.validate("garbage").await.unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)), "{err:?}");
        assert!(engine.is_revoked("garbage").await);
        assert!(engine.is_revoked("").await);
    }

    #[tokio::test]
    async fn revocation_store_failures_surface_and_fail_closed() {
        let engine = TokenEngine::new(SECRET, TokenConfig::default(), Arc::new(BrokenStore));
        let pair = engine.generate(7, &[]).unwrap();

        let err = engine.validate(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, TokenError::Store(_)), "{err:?}");
        assert!(engine.is_revoked(&pair.access_token).await);

        let err = engine.revoke(&pair.access_token).await.unwrap_err();
        assert!(matches!(err.cause(), TokenError::Store(_)), "{err:?}");
    }

    #[tokio::test]
    async fn concurrent_revocations_of_same_token_succeed() {
        let engine = engine();
        let pair = engine.generate(7, &[]).unwrap();

        let (a, b) = tokio::join!(
            engine.revoke(&pair.access_token),
            engine.revoke(&pair.access_token)
        );
        assert!(a.is_ok() && b.is_ok());
        assert!(engine.is_revoked(&pair.access_token).await);
    }
}
