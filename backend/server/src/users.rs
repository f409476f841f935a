//! # Users
//!
//! Accounts are created on first login. Grade, role and house come from the
//! roster resolver; everything else comes from the identity provider.
//!
//! ## Redis
//! - `users`: user id -> JSON [`User`]
//! - `user_providers`: provider id -> user id, claimed with `HSETNX` so two
//!   concurrent first logins create one account
use chrono::{DateTime, Utc};
use roster::{Descriptor, Grade, House, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub provider_id: String,
    pub display_name: String,
    pub email: String,
    pub picture: Option<String>,
    #[serde(default)]
    pub introduction: String,
    pub grade: Grade,
    pub role: Role,
    pub house: House,
    pub created_at: DateTime<Utc>,
}

/// Profile handed over by the identity provider after login.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
    pub picture: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub introduction: String,
    pub picture: Option<String>,
    pub grade: Grade,
    pub role: Role,
    pub house: House,
}

impl Identity {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.id.trim().is_empty() || self.name.trim().is_empty() || self.email.trim().is_empty() {
            return Err(AppError::MalformedPayload(
                "id, name and email are required".to_string(),
            ));
        }

        Ok(())
    }
}

impl User {
    pub fn provision(identity: Identity, descriptor: Descriptor, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider_id: identity.id,
            display_name: identity.name,
            email: identity.email,
            picture: identity.picture,
            introduction: String::new(),
            grade: descriptor.grade,
            role: descriptor.role,
            house: descriptor.house,
            created_at: now,
        }
    }

    pub fn descriptor(&self) -> Descriptor {
        Descriptor::new(self.grade, self.role, self.house)
    }

    pub fn matches(&self, query: &str) -> bool {
        self.display_name
            .to_lowercase()
            .contains(&query.trim().to_lowercase())
    }

    /// Moves a student up one grade. Seniors and staff are left alone;
    /// seniors leave through graduation instead.
    pub fn promote(&mut self) -> bool {
        match self.grade.promoted() {
            Some(next) if self.grade.is_student() => {
                self.grade = next;
                true
            }
            _ => false,
        }
    }

    pub fn apply(&mut self, update: UserUpdate) {
        self.display_name = update.display_name;
        self.email = update.email;
        self.introduction = update.introduction;
        self.picture = update.picture;
        self.grade = update.grade;
        self.role = update.role;
        self.house = update.house;
    }

    pub fn is_leader_of(&self, house: House) -> bool {
        self.house == house && self.role == Role::HouseLeader
    }
}

/// A house has at most one faculty leader and one senior leader.
pub fn check_leader(user_id: Uuid, update: &UserUpdate, users: &[User]) -> Result<(), AppError> {
    if update.role != Role::HouseLeader {
        return Ok(());
    }

    if !matches!(update.grade, Grade::Twelve | Grade::Faculty) {
        return Err(AppError::MalformedPayload(
            "House leader should be a faculty member or senior".to_string(),
        ));
    }

    let taken = users.iter().any(|other| {
        other.id != user_id && other.is_leader_of(update.house) && other.grade == update.grade
    });

    if taken {
        return Err(AppError::Conflict("Duplicate house leader".to_string()));
    }

    Ok(())
}
