use chrono::Utc;
use sea_orm::{QueryFilter, prelude::*};

use crate::{EngineError, ResultEngine, User, UserProfile, users};

use super::{Engine, is_unique_violation, require_text};

fn duplicate_email() -> EngineError {
    EngineError::ExistingKey("a user with this email address".to_string())
}

impl Engine {
    /// Register a new customer.
    ///
    /// The profile is validated and normalized first; a second registration
    /// with the same email fails with [`EngineError::ExistingKey`], also when
    /// it races the first one and only the unique index catches it.
    pub async fn register_user(&self, profile: UserProfile) -> ResultEngine<User> {
        let profile = profile.validate()?;

        let existing = users::Entity::find()
            .filter(users::Column::Email.eq(profile.email.clone()))
            .one(&self.database)
            .await?;
        if existing.is_some() {
            return Err(duplicate_email());
        }

        let model = users::ActiveModel::new_customer(&profile, Utc::now())
            .insert(&self.database)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    duplicate_email()
                } else {
                    EngineError::Persistence(err)
                }
            })?;
        let user = User::try_from(model)?;
        tracing::info!(key = %user.key, "user registered");
        Ok(user)
    }

    /// Look up the owner profile addressed by `key`.
    pub async fn resolve_owner(&self, key: &str) -> ResultEngine<Option<User>> {
        let key = require_text(key, "please provide a valid user")?;
        users::Entity::find()
            .filter(users::Column::Key.eq(key))
            .one(&self.database)
            .await?
            .map(User::try_from)
            .transpose()
    }

    pub(super) async fn require_owner(&self, key: &str) -> ResultEngine<User> {
        self.resolve_owner(key)
            .await?
            .ok_or_else(|| EngineError::UserNotFound(key.trim().to_string()))
    }

    /// Delete a user by email. Only meant for test fixtures.
    pub async fn delete_user(&self, email: &str) -> ResultEngine<()> {
        users::Entity::delete_many()
            .filter(users::Column::Email.eq(email.trim().to_lowercase()))
            .exec(&self.database)
            .await?;
        Ok(())
    }
}
