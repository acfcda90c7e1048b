use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::accounts::{
    dto::{PublicUser, RegisterRequest, TokenRequest, UpdateMeRequest},
    errors::{AccountError, AuthError, FieldErrors},
    password::{hash_password, verify_password},
    repo::{MemoryStore, RepoError, TokenRepository, UserRepository},
    repo_types::{NewUser, User, UserChanges},
    token::generate_key,
    validation::{
        check_email, check_name, check_password, normalize_email, DUPLICATE_EMAIL, REQUIRED,
    },
};

/// Create, authenticate, read and update user accounts.
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn TokenRepository>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserRepository>, tokens: Arc<dyn TokenRepository>) -> Self {
        Self { users, tokens }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(store.clone(), store)
    }

    #[instrument(skip_all)]
    pub async fn register(&self, req: RegisterRequest) -> Result<PublicUser, AccountError> {
        let email = req.email.as_deref().map(normalize_email);
        let name = req.name.as_deref().map(str::trim);

        let mut errors = FieldErrors::new();
        let email_ok = check_email(email.as_deref(), &mut errors);
        check_password(req.password.as_deref(), &mut errors);
        check_name(name, &mut errors);

        if let (true, Some(email)) = (email_ok, email.as_deref()) {
            if self.users.find_by_email(email).await?.is_some() {
                warn!(email = %email, "email already registered");
                errors.add("email", DUPLICATE_EMAIL);
            }
        }
        errors.into_result()?;

        let (Some(email), Some(password), Some(name)) = (email, req.password, name) else {
            return Err(anyhow::anyhow!("validated registration is missing a field").into());
        };

        let new = NewUser {
            email,
            password_hash: hash_password(&password)?,
            name: name.to_string(),
        };
        let user = match self.users.insert(new).await {
            Ok(u) => u,
            // lost a race with a concurrent registration
            Err(RepoError::DuplicateEmail) => {
                warn!("email already registered at insert");
                return Err(AccountError::Validation(FieldErrors::single(
                    "email",
                    DUPLICATE_EMAIL,
                )));
            }
            Err(RepoError::Other(e)) => return Err(e.into()),
        };

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user.into())
    }

    /// Returns the user's token, creating one on first successful login.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, req: TokenRequest) -> Result<String, AccountError> {
        let mut missing = FieldErrors::new();
        if req.email.is_none() {
            missing.add("email", REQUIRED);
        }
        if req.password.is_none() {
            missing.add("password", REQUIRED);
        }
        missing.into_result()?;

        let email = req.email.as_deref().map(normalize_email).unwrap_or_default();
        let password = req.password.unwrap_or_default();
        if email.is_empty() {
            return Err(AuthError::BlankField("email").into());
        }
        if password.trim().is_empty() {
            return Err(AuthError::BlankField("password").into());
        }

        let Some(user) = self.users.find_by_email(&email).await? else {
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials.into());
        };
        if !verify_password(&password, &user.password_hash)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let token = self.tokens.get_or_create(user.id, &generate_key()).await?;
        info!(user_id = %user.id, "token issued");
        Ok(token)
    }

    #[instrument(skip_all)]
    pub async fn get_self(&self, token: &str) -> Result<PublicUser, AccountError> {
        Ok(self.resolve(token).await?.into())
    }

    #[instrument(skip_all)]
    pub async fn update_self(
        &self,
        token: &str,
        req: UpdateMeRequest,
    ) -> Result<PublicUser, AccountError> {
        let user = self.resolve(token).await?;

        let name = req.name.as_deref().map(str::trim);
        let mut errors = FieldErrors::new();
        if req.password.is_some() {
            check_password(req.password.as_deref(), &mut errors);
        }
        if name.is_some() {
            check_name(name, &mut errors);
        }
        errors.into_result()?;

        let changes = UserChanges {
            password_hash: req.password.as_deref().map(hash_password).transpose()?,
            name: name.map(str::to_string),
        };
        if changes.is_empty() {
            return Ok(user.into());
        }

        let password_changed = changes.password_hash.is_some();
        let updated = self
            .users
            .update(user.id, changes)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        info!(user_id = %updated.id, password_changed, "user updated");
        Ok(updated.into())
    }

    async fn resolve(&self, token: &str) -> Result<User, AccountError> {
        let Some(user_id) = self.tokens.find_user_id(token).await? else {
            debug!("unknown token");
            return Err(AuthError::InvalidToken.into());
        };
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::InvalidToken.into())
    }
}
