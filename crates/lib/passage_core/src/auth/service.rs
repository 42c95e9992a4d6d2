//! Authentication orchestrator.
//!
//! Provider client → claims mapper → account reconciler → token engine, plus
//! profile read/update. Each collaborator keeps its own error category; no
//! call is retried here.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::{AuthError, TokenError};
use super::tokens::TokenEngine;
use crate::models::auth::{AuthResult, TokenClaims, TokenPair};
use crate::models::oauth::OAuthProvider;
use crate::models::user::{ProfileUpdate, UserView};
use crate::oauth::ProviderError;
use crate::oauth::claims::map_claims;
use crate::oauth::provider::ProviderClient;
use crate::users::StoreError;
use crate::users::reconcile::AccountReconciler;
use crate::users::store::UserStore;

/// End-to-end login and session service.
#[derive(Clone)]
pub struct AuthService {
    provider_client: Arc<dyn ProviderClient>,
    users: Arc<dyn UserStore>,
    reconciler: AccountReconciler,
    tokens: TokenEngine,
}

impl AuthService {
    pub fn new(
        provider_client: Arc<dyn ProviderClient>,
        users: Arc<dyn UserStore>,
        tokens: TokenEngine,
    ) -> Self {
        Self {
            provider_client,
            reconciler: AccountReconciler::new(users.clone()),
            users,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenEngine {
        &self.tokens
    }

    /// Log in with a provider access token.
    pub async fn authenticate(
        &self,
        provider: OAuthProvider,
        provider_token: &str,
    ) -> Result<AuthResult, AuthError> {
        let response = self
            .provider_client
            .fetch_claims(provider, provider_token)
            .await?;
        if response.status != 200 {
            warn!(%provider, status = response.status, "provider rejected token");
            return Err(ProviderError::Status {
                provider,
                status: response.status,
            }
            .into());
        }

        let identity = map_claims(provider, &response.claims)?;
        let user = self.reconciler.find_or_create(&identity).await?;
        let user_id = user
            .id
            .ok_or_else(|| StoreError::Backend("store returned a user without an id".into()))?;

        let pair = self.tokens.generate(user_id, &user.role_list())?;
        info!(user_id, %provider, "user authenticated");

        Ok(AuthResult {
            user: UserView::from(&user),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
        })
    }

    /// Rotate a refresh token. The new pair carries the user's current roles,
    /// so a demotion takes effect on the next refresh.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.tokens.check_refresh(refresh_token).await?;
        let invalid = || TokenError::RefreshFailed(Box::new(TokenError::InvalidRefreshToken));
        let user_id = claims.user_id().ok_or_else(invalid)?;
        let Some(user) = self.users.find_by_id(user_id).await? else {
            warn!(user_id, "refresh token for unknown user");
            return Err(invalid().into());
        };
        Ok(self.tokens.rotate(&claims, &user.role_list()).await?)
    }

    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        Ok(self.tokens.revoke(token).await?)
    }

    pub async fn validate(&self, token: &str) -> Result<TokenClaims, AuthError> {
        Ok(self.tokens.validate(token).await?)
    }

    pub async fn get_profile(&self, user_id: i64) -> Result<UserView, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound(user_id))?;
        Ok(UserView::from(&user))
    }

    /// Apply the supplied fields only. Role values are validated upstream.
    pub async fn update_profile(
        &self,
        user_id: i64,
        update: ProfileUpdate,
    ) -> Result<UserView, AuthError> {
        let mut user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound(user_id))?;

        if let Some(avatar) = update.avatar {
            user.avatar_url = Some(avatar);
        }
        if let Some(roles) = update.roles {
            if roles.is_empty() {
                return Err(AuthError::InvalidProfile("roles must not be empty".into()));
            }
            user.roles = roles;
        }
        user.updated_at = Some(Utc::now());

        let user = self.users.update(user).await?;
        info!(user_id, "profile updated");
        Ok(UserView::from(&user))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::auth::revocation::InMemoryRevocationStore;
    use crate::auth::tokens::TokenConfig;
    use crate::auth::ErrorCategory;
    use crate::models::user::User;
    use crate::oauth::ClaimsError;
    use crate::oauth::provider::ProviderResponse;
    use crate::users::store::InMemoryUserStore;

    /// Provider client returning a canned response and recording calls.
    struct StubProvider {
        status: u16,
        claims: Value,
        calls: Mutex<Vec<(OAuthProvider, String)>>,
    }

    impl StubProvider {
        fn new(status: u16, claims: Value) -> Arc<Self> {
            Arc::new(Self {
                status,
                claims,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ProviderClient for StubProvider {
        async fn fetch_claims(
            &self,
            provider: OAuthProvider,
            token: &str,
        ) -> Result<ProviderResponse, ProviderError> {
            self.calls
                .lock()
                .unwrap()
                .push((provider, token.to_string()));
            Ok(ProviderResponse {
                status: self.status,
                claims: self.claims.clone(),
            })
        }
    }

    struct UnreachableProvider;

    #[async_trait]
    impl ProviderClient for UnreachableProvider {
        async fn fetch_claims(
            &self,
            _provider: OAuthProvider,
            _token: &str,
        ) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::Transport("connection refused".into()))
        }
    }

    /// User store that always fails.
    struct DownStore;

    #[async_trait]
    impl UserStore for DownStore {
        async fn find_by_provider_identity(
            &self,
            _provider: OAuthProvider,
            _subject_id: &str,
        ) -> Result<Option<User>, StoreError> {
            Err(StoreError::Backend("down".into()))
        }

        async fn find_by_id(&self, _id: i64) -> Result<Option<User>, StoreError> {
            Err(StoreError::Backend("down".into()))
        }

        async fn create(&self, _user: User) -> Result<User, StoreError> {
            Err(StoreError::Backend("down".into()))
        }

        async fn update(&self, _user: User) -> Result<User, StoreError> {
            Err(StoreError::Backend("down".into()))
        }
    }

    fn engine() -> TokenEngine {
        TokenEngine::new(
            b"service-test-secret",
            TokenConfig::default(),
            Arc::new(InMemoryRevocationStore::new()),
        )
    }

    fn service(provider: Arc<dyn ProviderClient>) -> (AuthService, Arc<InMemoryUserStore>) {
        let users = Arc::new(InMemoryUserStore::new());
        (AuthService::new(provider, users.clone(), engine()), users)
    }

    #[tokio::test]
    async fn first_time_google_login_creates_user_and_tokens() {
        let provider = StubProvider::new(
            200,
            json!({"sub": "1", "email": "x@y.com", "email_verified": true}),
        );
        let (svc, users) = service(provider.clone());

        let result = svc
            .authenticate(OAuthProvider::Google, "provider-token")
            .await
            .unwrap();

        let id = result.user.id.expect("store assigns id");
        assert_eq!(users.len(), 1);
        assert_eq!(result.user.email, "x@y.com");
        assert!(result.user.is_verified);
        assert_eq!(result.expires_in, 3600);

        let claims = svc.validate(&result.access_token).await.unwrap();
        assert_eq!(claims.user_id(), Some(id));
        assert_eq!(claims.roles, vec!["USER".to_string()]);

        let calls = provider.calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[(OAuthProvider::Google, "provider-token".to_string())]
        );
    }

    #[tokio::test]
    async fn repeat_login_reuses_account() {
        let provider = StubProvider::new(
            200,
            json!({"id": "7", "email": "c@d.com", "picture": {"data": {"url": "http://x/y.png"}}}),
        );
        let (svc, users) = service(provider);

        let first = svc.authenticate(OAuthProvider::Facebook, "t").await.unwrap();
        let second = svc.authenticate(OAuthProvider::Facebook, "t").await.unwrap();

        assert_eq!(first.user.id, second.user.id);
        assert_eq!(second.user.avatar.as_deref(), Some("http://x/y.png"));
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn non_200_is_upstream_error() {
        let (svc, users) = service(StubProvider::new(401, Value::Null));

        let err = svc
            .authenticate(OAuthProvider::Google, "bad")
            .await
            .unwrap_err();
        assert!(
            matches!(err, AuthError::Upstream(ProviderError::Status { status: 401, .. })),
            "{err:?}"
        );
        assert_eq!(err.category(), ErrorCategory::Upstream);
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_upstream_error() {
        let (svc, _) = service(Arc::new(UnreachableProvider));
        let err = svc
            .authenticate(OAuthProvider::Facebook, "t")
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Upstream);
    }

    #[tokio::test]
    async fn missing_claims_propagate_as_input_error() {
        let (svc, _) = service(StubProvider::new(200, json!({"id": "7"})));
        let err = svc
            .authenticate(OAuthProvider::Facebook, "t")
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                AuthError::Claims(ClaimsError::MissingClaim { field: "email", .. })
            ),
            "{err:?}"
        );
        assert_eq!(err.category(), ErrorCategory::Input);
    }

    #[tokio::test]
    async fn store_failure_is_storage_error() {
        let provider = StubProvider::new(200, json!({"sub": "1", "email": "x@y.com"}));
        let svc = AuthService::new(provider, Arc::new(DownStore), engine());

        let err = svc
            .authenticate(OAuthProvider::Google, "t")
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Storage);
    }

    #[tokio::test]
    async fn refresh_and_revoke_delegate_to_engine() {
        let provider = StubProvider::new(200, json!({"sub": "1", "email": "x@y.com"}));
        let (svc, _) = service(provider);
        let login = svc.authenticate(OAuthProvider::Google, "t").await.unwrap();

        let pair = svc.refresh(&login.refresh_token).await.unwrap();
        let err = svc.validate(&login.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::Token(TokenError::Revoked)), "{err:?}");

        svc.revoke(&pair.access_token).await.unwrap();
        svc.revoke(&pair.access_token).await.unwrap();
        assert!(svc.tokens().is_revoked(&pair.access_token).await);
    }

    #[tokio::test]
    async fn refresh_picks_up_current_roles() {
        let provider = StubProvider::new(200, json!({"sub": "1", "email": "x@y.com"}));
        let (svc, _) = service(provider);
        let login = svc.authenticate(OAuthProvider::Google, "t").await.unwrap();
        let id = login.user.id.unwrap();

        let promote = ProfileUpdate {
            avatar: None,
            roles: Some(BTreeSet::from(["ADMIN".to_string()])),
        };
        svc.update_profile(id, promote).await.unwrap();
        let pair = svc.refresh(&login.refresh_token).await.unwrap();
        let claims = svc.validate(&pair.access_token).await.unwrap();
        assert_eq!(claims.roles, vec!["ADMIN".to_string()]);

        let demote = ProfileUpdate {
            avatar: None,
            roles: Some(BTreeSet::from(["USER".to_string()])),
        };
        svc.update_profile(id, demote).await.unwrap();
        let pair = svc.refresh(&login.refresh_token).await.unwrap();
        let claims = svc.validate(&pair.access_token).await.unwrap();
        assert_eq!(claims.roles, vec!["USER".to_string()]);
    }

    #[tokio::test]
    async fn refresh_for_vanished_user_is_rejected() {
        let (svc, _) = service(StubProvider::new(200, Value::Null));
        let pair = svc.tokens().generate(99, &["USER".to_string()]).unwrap();

        let err = svc.refresh(&pair.refresh_token).await.unwrap_err();
        match &err {
            AuthError::Token(e) => {
                assert!(matches!(e.cause(), TokenError::InvalidRefreshToken), "{err:?}")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(err.category(), ErrorCategory::Token);
    }

    #[tokio::test]
    async fn get_profile_of_unknown_user_is_not_found() {
        let (svc, _) = service(StubProvider::new(200, Value::Null));
        let err = svc.get_profile(404).await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound(404)));
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[tokio::test]
    async fn update_profile_applies_only_supplied_fields() {
        let provider = StubProvider::new(
            200,
            json!({"sub": "1", "email": "x@y.com", "picture": "http://old.png"}),
        );
        let (svc, _) = service(provider);
        let login = svc.authenticate(OAuthProvider::Google, "t").await.unwrap();
        let id = login.user.id.unwrap();

        let roles = BTreeSet::from(["ADMIN".to_string(), "USER".to_string()]);
        let view = svc
            .update_profile(
                id,
                ProfileUpdate {
                    avatar: None,
                    roles: Some(roles),
                },
            )
            .await
            .unwrap();
        assert_eq!(view.avatar.as_deref(), Some("http://old.png"));
        assert_eq!(view.roles, vec!["ADMIN".to_string(), "USER".to_string()]);
        assert!(view.updated_at.is_some());

        let view = svc
            .update_profile(
                id,
                ProfileUpdate {
                    avatar: Some("http://new.png".into()),
                    roles: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(view.avatar.as_deref(), Some("http://new.png"));
        assert_eq!(view.roles.len(), 2);
        assert_eq!(svc.get_profile(id).await.unwrap(), view);
    }

    #[tokio::test]
    async fn update_profile_rejects_empty_roles_and_unknown_user() {
        let provider = StubProvider::new(200, json!({"sub": "1", "email": "x@y.com"}));
        let (svc, _) = service(provider);
        let login = svc.authenticate(OAuthProvider::Google, "t").await.unwrap();
        let id = login.user.id.unwrap();

        let err = svc
            .update_profile(
                id,
                ProfileUpdate {
                    avatar: None,
                    roles: Some(BTreeSet::new()),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Input);

        let err = svc
            .update_profile(999, ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound(999)));
    }
}
