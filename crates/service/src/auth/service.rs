use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHasher, PasswordVerifier, SaltString},
    Argon2, PasswordHash,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header as JwtHeader, Validation};
use rand::rngs::OsRng;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::domain::{AuthSession, AuthUser, Claims, LoginInput, RegisterInput, TokenPair};
use super::errors::AuthError;
use super::repository::AuthRepository;

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

/// Auth service configuration
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub access_token_minutes: i64,
    pub refresh_token_hours: i64,
    pub password_algorithm: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            access_token_minutes: 60,
            refresh_token_hours: 24,
            password_algorithm: "argon2".into(),
        }
    }
}

/// Decode and verify a token issued by [`AuthService`].
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data =
        decode::<Claims>(token, &key, &validation).map_err(|e| AuthError::TokenError(e.to_string()))?;
    Ok(data.claims)
}

/// Auth business service independent of web framework
pub struct AuthService<R: AuthRepository> {
    repo: Arc<R>,
    cfg: AuthConfig,
}

impl<R: AuthRepository> AuthService<R> {
    pub fn new(repo: Arc<R>, cfg: AuthConfig) -> Self {
        Self { repo, cfg }
    }

    /// Register a new user with a hashed password.
    ///
    /// # Examples
    /// ```
    /// use service::auth::{service::{AuthService, AuthConfig}, repository::mock::MockAuthRepository};
    /// use service::auth::domain::RegisterInput;
    /// use std::sync::Arc;
    /// let repo = Arc::new(MockAuthRepository::default());
    /// let svc = AuthService::new(repo, AuthConfig::default());
    /// let input = RegisterInput { email: "user@example.com".into(), username: "user1".into(), password: "Secret123".into(), phone: None };
    /// let user = tokio_test::block_on(svc.register(input)).unwrap();
    /// assert_eq!(user.email, "user@example.com");
    /// ```
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> Result<AuthUser, AuthError> {
        if input.password.len() < 8 {
            return Err(AuthError::validation(
                "password",
                "This password is too short. It must contain at least 8 characters.",
            ));
        }
        if let Some(existing) = self.repo.find_user_by_email(&input.email).await? {
            debug!("user exists: {}", existing.email);
            return Err(AuthError::Conflict);
        }

        let user = self
            .repo
            .create_user(&input.email, &input.username, input.phone.as_deref())
            .await?;
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(input.password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string();

        let _cred = self
            .repo
            .upsert_password(user.id, hash, self.cfg.password_algorithm.clone())
            .await?;
        info!(user_id = %user.id, email = %user.email, "user_registered");
        Ok(user)
    }

    /// Authenticate a user and issue an access/refresh token pair.
    ///
    /// # Examples
    /// ```
    /// use service::auth::{service::{AuthService, AuthConfig}, repository::mock::MockAuthRepository};
    /// use service::auth::domain::{RegisterInput, LoginInput};
    /// use std::sync::Arc;
    /// let repo = Arc::new(MockAuthRepository::default());
    /// let cfg = AuthConfig { jwt_secret: Some("secret".into()), ..AuthConfig::default() };
    /// let svc = AuthService::new(repo.clone(), cfg);
    /// let _ = tokio_test::block_on(svc.register(RegisterInput { email: "u@e.com".into(), username: "u".into(), password: "Passw0rd".into(), phone: None }));
    /// let session = tokio_test::block_on(svc.login(LoginInput { email: "u@e.com".into(), password: "Passw0rd".into() })).unwrap();
    /// assert_eq!(session.user.email, "u@e.com");
    /// assert!(session.tokens.is_some());
    /// ```
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: LoginInput) -> Result<AuthSession, AuthError> {
        let user = self
            .repo
            .find_user_by_email(&input.email)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        let cred = self
            .repo
            .get_credentials(user.id)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        let parsed =
            PasswordHash::new(&cred.password_hash).map_err(|e| AuthError::HashError(e.to_string()))?;
        if Argon2::default().verify_password(input.password.as_bytes(), &parsed).is_err() {
            return Err(AuthError::Unauthorized);
        }

        let tokens = match &self.cfg.jwt_secret {
            Some(_) => Some(self.issue_tokens(&user)?),
            None => None,
        };
        info!(user_id = %user.id, "user_logged_in");
        Ok(AuthSession { user, tokens })
    }

    /// Exchange a refresh token for a fresh access token.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let secret = self
            .cfg
            .jwt_secret
            .as_deref()
            .ok_or_else(|| AuthError::TokenError("token signing disabled".into()))?;
        let claims = decode_token(secret, refresh_token)?;
        if claims.token_type != TOKEN_TYPE_REFRESH {
            return Err(AuthError::TokenError("token has wrong type".into()));
        }
        let uid = Uuid::parse_str(&claims.uid)
            .map_err(|e| AuthError::TokenError(e.to_string()))?;
        // Reject tokens for users that have since been removed
        let user = self.repo.find_user_by_id(uid).await?.ok_or(AuthError::Unauthorized)?;
        self.encode_token(&user, TOKEN_TYPE_ACCESS, chrono::Duration::minutes(self.cfg.access_token_minutes))
    }

    /// Issue a full access/refresh pair for an authenticated user.
    pub fn issue_tokens(&self, user: &AuthUser) -> Result<TokenPair, AuthError> {
        let access = self.encode_token(
            user,
            TOKEN_TYPE_ACCESS,
            chrono::Duration::minutes(self.cfg.access_token_minutes),
        )?;
        let refresh = self.encode_token(
            user,
            TOKEN_TYPE_REFRESH,
            chrono::Duration::hours(self.cfg.refresh_token_hours),
        )?;
        Ok(TokenPair { access, refresh })
    }

    fn encode_token(
        &self,
        user: &AuthUser,
        token_type: &str,
        ttl: chrono::Duration,
    ) -> Result<String, AuthError> {
        let secret = self
            .cfg
            .jwt_secret
            .as_deref()
            .ok_or_else(|| AuthError::TokenError("token signing disabled".into()))?;
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: user.email.clone(),
            uid: user.id.to_string(),
            token_type: token_type.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + ttl).timestamp() as usize,
        };
        encode(&JwtHeader::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
            .map_err(|e| AuthError::TokenError(e.to_string()))
    }
}
