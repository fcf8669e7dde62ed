//! Account owners.
//!
//! The ledger only needs to know that an owner exists and is addressable by
//! its `key`; profile validation lives in [`UserProfile::validate`].

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::{EngineError, ResultEngine};

/// Youngest age allowed to open an account.
pub const MIN_AGE: i32 = 18;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            other => Err(EngineError::InvalidRequest(format!("invalid role: {other}"))),
        }
    }
}

/// Profile data supplied when registering a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: i32,
}

impl UserProfile {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        age: i32,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            age,
        }
    }

    /// Check required fields and normalize names and email.
    pub fn validate(self) -> ResultEngine<Self> {
        let first_name = capitalize(&self.first_name);
        let last_name = capitalize(&self.last_name);
        let email = self.email.trim().to_lowercase();

        if first_name.is_empty() {
            return Err(EngineError::InvalidRequest(
                "first name is required".to_string(),
            ));
        }
        if last_name.is_empty() {
            return Err(EngineError::InvalidRequest(
                "last name is required".to_string(),
            ));
        }
        if email.is_empty() {
            return Err(EngineError::InvalidRequest("email is required".to_string()));
        }
        if self.age < MIN_AGE {
            return Err(EngineError::InvalidRequest(format!(
                "age must be greater than {}",
                MIN_AGE - 1
            )));
        }

        Ok(Self {
            first_name,
            last_name,
            email,
            age: self.age,
        })
    }
}

/// First letter upper-case, the rest lower-case, NFC normalized.
fn capitalize(value: &str) -> String {
    let normalized: String = value.trim().nfc().collect();
    let mut chars = normalized.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Deterministic user key derived from the validated profile and role.
pub(crate) fn derive_key(profile: &UserProfile, role: Role) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(profile.first_name.as_bytes());
    hasher.update(profile.last_name.as_bytes());
    hasher.update(profile.email.as_bytes());
    hasher.update(role.as_str().as_bytes());
    hex::encode(hasher.finalize().as_bytes())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(skip)]
    pub id: i32,
    pub key: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: i32,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub key: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: i32,
    pub role: String,
    pub active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::accounts::Entity")]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn new_customer(profile: &UserProfile, now: DateTime<Utc>) -> Self {
        let role = Role::Customer;
        Self {
            id: ActiveValue::NotSet,
            key: ActiveValue::Set(derive_key(profile, role)),
            first_name: ActiveValue::Set(profile.first_name.clone()),
            last_name: ActiveValue::Set(profile.last_name.clone()),
            email: ActiveValue::Set(profile.email.clone()),
            age: ActiveValue::Set(profile.age),
            role: ActiveValue::Set(role.as_str().to_string()),
            active: ActiveValue::Set(true),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        }
    }
}

impl TryFrom<Model> for User {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            key: model.key,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            age: model.age,
            role: Role::try_from(model.role.as_str())?,
            active: model.active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
