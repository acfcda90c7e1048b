use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,                     // internal id, never exposed
    pub email: String,                // lowercased, unique
    pub password_hash: String,        // Argon2 PHC string
    pub name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub date_joined: OffsetDateTime,
}

/// Fields needed to insert a new user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
}

/// Partial update of a user; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub password_hash: Option<String>,
    pub name: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.password_hash.is_none() && self.name.is_none()
    }

    pub(crate) fn apply(self, user: &mut User) {
        if let Some(hash) = self.password_hash {
            user.password_hash = hash;
        }
        if let Some(name) = self.name {
            user.name = name;
        }
    }
}
