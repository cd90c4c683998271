//! Registration, login and bearer token resolution.

use std::sync::LazyLock;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{hash_password, verify_password};
use crate::db::{AccountStatus, Subscription, User, UserProfile};
use crate::error::{AuthError, ServiceError, ServiceResult};
use crate::service::FolioService;

const FULL_NAME_MIN_CHARS: usize = 2;
const FULL_NAME_MAX_CHARS: usize = 100;
const PASSWORD_MIN_CHARS: usize = 6;

/// Verified against when the email is unknown so both login failures cost
/// one argon2 verification
static DUMMY_PASSWORD_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("folio-dummy-password").ok());

/// A freshly issued token and the account it belongs to
#[derive(Debug, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: UserProfile,
}

impl FolioService {
    /// Create an account and sign it in
    pub async fn register(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> ServiceResult<AuthSession> {
        let full_name = full_name.trim();
        let email = email.trim().to_lowercase();

        let name_chars = full_name.chars().count();
        if !(FULL_NAME_MIN_CHARS..=FULL_NAME_MAX_CHARS).contains(&name_chars) {
            return Err(invalid(format!(
                "Full name must be between {} and {} characters",
                FULL_NAME_MIN_CHARS, FULL_NAME_MAX_CHARS
            )));
        }
        if !is_valid_email(&email) {
            return Err(invalid("Please provide a valid email".to_string()));
        }
        if password.chars().count() < PASSWORD_MIN_CHARS {
            return Err(invalid(format!(
                "Password must be at least {} characters",
                PASSWORD_MIN_CHARS
            )));
        }

        if self.db.get_user_by_email(&email)?.is_some() {
            return Err(AuthError::EmailTaken.into());
        }

        let password = password.to_string();
        let password_hash =
            Self::run_blocking(move || hash_password(&password).map_err(ServiceError::from))
                .await?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            full_name: full_name.to_string(),
            email,
            password_hash,
            profile_image: None,
            account_status: AccountStatus::Active,
            subscription: Subscription::Free,
            created_at: now,
            updated_at: now,
            last_login: None,
        };

        // A concurrent registration may have claimed the email since the check
        if !self.db.insert_user(&user)? {
            return Err(AuthError::EmailTaken.into());
        }

        info!(user_id = %user.id, "User registered");

        let token = self.tokens.issue(&user.id)?;
        Ok(AuthSession {
            token,
            user: UserProfile::from(&user),
        })
    }

    /// Verify credentials and issue a token.
    ///
    /// Unknown email and wrong password are indistinguishable. The account
    /// status is only revealed once the password has been verified.
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<AuthSession> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || password.is_empty() {
            return Err(invalid("Please provide email and password".to_string()));
        }

        let user = self.db.get_user_by_email(&email)?;

        let candidate = password.to_string();
        let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
        let verified = Self::run_blocking(move || {
            Ok(match stored_hash {
                Some(hash) => verify_password(&candidate, &hash),
                None => {
                    if let Some(dummy) = DUMMY_PASSWORD_HASH.as_deref() {
                        let _ = verify_password(&candidate, dummy);
                    }
                    false
                }
            })
        })
        .await?;

        let Some(user) = user else {
            record_login_outcome("invalid_credentials");
            return Err(AuthError::InvalidCredentials.into());
        };

        if !verified {
            record_login_outcome("invalid_credentials");
            debug!(user_id = %user.id, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        if !user.is_active() {
            record_login_outcome("inactive");
            warn!(
                user_id = %user.id,
                status = user.account_status.as_ref(),
                "Login rejected: account not active"
            );
            return Err(AuthError::AccountInactive.into());
        }

        let now = Utc::now();
        self.db.record_login(&user.id, now)?;
        record_login_outcome("success");
        info!(user_id = %user.id, "User logged in");

        let token = self.tokens.issue(&user.id)?;
        Ok(AuthSession {
            token,
            user: UserProfile::from(&user),
        })
    }

    /// Resolve a bearer token to an active user
    pub fn authenticate(&self, token: &str) -> ServiceResult<User> {
        let claims = self.tokens.verify(token)?;

        let user = self
            .db
            .get_user(&claims.sub)?
            .ok_or(AuthError::UnknownUser)?;

        if !user.is_active() {
            return Err(AuthError::AccountInactive.into());
        }

        Ok(user)
    }
}

fn invalid(message: String) -> ServiceError {
    ServiceError::InvalidRequest { message }
}

fn record_login_outcome(outcome: &'static str) {
    metrics::counter!("folio_logins_total", "outcome" => outcome).increment(1);
}

/// `local@domain.tld` with exactly one `@` and no whitespace anywhere
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && domain
            .char_indices()
            .any(|(dot, c)| c == '.' && dot > 0 && dot + 1 < domain.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::test_service;

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last@mail.example.org"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("user@.com"));
        assert!(!is_valid_email("user@example."));
        assert!(!is_valid_email("us er@example.com"));
        assert!(!is_valid_email("a@b@c.de"));
        assert!(!is_valid_email("a@@c.de"));
        assert!(!is_valid_email(""));
    }

    #[tokio::test]
    async fn test_register_normalizes_email_and_issues_token() {
        let (service, _dir) = test_service().await;

        let session = service
            .register("  Ada Lovelace ", " Ada@Example.COM ", "secret123")
            .await
            .unwrap();

        assert_eq!(session.user.email, "ada@example.com");
        assert_eq!(session.user.full_name, "Ada Lovelace");
        let user = service.authenticate(&session.token).unwrap();
        assert_eq!(user.id, session.user.id);
        assert_ne!(user.password_hash, "secret123");
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (service, _dir) = test_service().await;

        for (name, email, password) in [
            ("A", "a@example.com", "secret123"),
            ("Ada", "not-an-email", "secret123"),
            ("Ada", "a@example.com", "12345"),
        ] {
            let err = service.register(name, email, password).await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidRequest { .. }), "{err}");
        }

        service
            .register("Ada", "a@example.com", "secret123")
            .await
            .unwrap();
        let err = service
            .register("Other", "A@example.com", "secret456")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Auth(AuthError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_wrong_password_matches_unknown_email() {
        let (service, _dir) = test_service().await;
        service
            .register("Ada", "ada@example.com", "secret123")
            .await
            .unwrap();

        let wrong = service.login("ada@example.com", "wrong-pass").await.unwrap_err();
        let unknown = service.login("nobody@example.com", "secret123").await.unwrap_err();

        assert!(matches!(wrong, ServiceError::Auth(AuthError::InvalidCredentials)));
        assert!(matches!(unknown, ServiceError::Auth(AuthError::InvalidCredentials)));
        assert_eq!(wrong.to_string(), unknown.to_string());

        // Unknown emails are checked against a real argon2 hash
        let dummy = DUMMY_PASSWORD_HASH.as_deref().unwrap();
        assert!(dummy.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn test_login_records_last_login() {
        let (service, _dir) = test_service().await;
        service
            .register("Ada", "ada@example.com", "secret123")
            .await
            .unwrap();

        let session = service.login("ADA@example.com", "secret123").await.unwrap();

        let stored = service.db.get_user(&session.user.id).unwrap().unwrap();
        assert!(stored.last_login.is_some());
    }

    #[tokio::test]
    async fn test_inactive_accounts() {
        let (service, _dir) = test_service().await;
        let session = service
            .register("Ada", "ada@example.com", "secret123")
            .await
            .unwrap();
        service
            .db
            .set_account_status(&session.user.id, AccountStatus::Suspended)
            .unwrap();

        // Wrong password still looks like bad credentials
        let err = service.login("ada@example.com", "nope-nope").await.unwrap_err();
        assert!(matches!(err, ServiceError::Auth(AuthError::InvalidCredentials)));

        let err = service.login("ada@example.com", "secret123").await.unwrap_err();
        assert!(matches!(err, ServiceError::Auth(AuthError::AccountInactive)));

        let err = service.authenticate(&session.token).unwrap_err();
        assert!(matches!(err, ServiceError::Auth(AuthError::AccountInactive)));
    }

    #[tokio::test]
    async fn test_token_for_missing_user() {
        let (service, _dir) = test_service().await;
        let token = service.tokens.issue("ghost").unwrap();

        let err = service.authenticate(&token).unwrap_err();
        assert!(matches!(err, ServiceError::Auth(AuthError::UnknownUser)));
    }
}
