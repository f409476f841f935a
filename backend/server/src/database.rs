//! # Redis
//!
//! RAM database holding users, houses and events.
//!
//! ## Requirements
//!
//! - Fast lookups by user id, provider id, house and event slug
//! - Small dataset: one school, a few hundred users, tens of events per year
//! - Atomic point updates
//!
//! ## Implementation
//!
//! - One Redis hash per collection, JSON values
//! - `HSETNX` claims unique keys (provider ids, event slugs). A user record is
//!   written before its provider id is claimed, so a claim never points at a
//!   record that was not stored
//! - `HINCRBY` for house points
//! - Listing reads the whole hash; the dataset is small enough that filtering
//!   in process beats maintaining secondary indexes
use std::{collections::HashMap, time::Duration};

use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use roster::House;
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;
use uuid::Uuid;

use crate::{
    error::AppError,
    events::Event,
    houses::{HouseProfile, HouseView},
    users::User,
};

pub const USERS: &str = "users";
pub const USER_PROVIDERS: &str = "user_providers";
pub const HOUSES: &str = "houses";
pub const HOUSE_POINTS: &str = "house_points";
pub const EVENTS: &str = "events";

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, AppError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;

    Ok(client.get_connection_manager_with_config(config).await?)
}

async fn get_json<T: DeserializeOwned>(
    conn: &mut ConnectionManager,
    key: &str,
    field: &str,
) -> Result<Option<T>, AppError> {
    let value: Option<String> = conn.hget(key, field).await?;

    Ok(value.map(|json| serde_json::from_str(&json)).transpose()?)
}

async fn put_json<T: Serialize>(
    conn: &mut ConnectionManager,
    key: &str,
    field: &str,
    value: &T,
) -> Result<(), AppError> {
    let json = serde_json::to_string(value)?;
    let _: () = conn.hset(key, field, json).await?;

    Ok(())
}

async fn all_json<T: DeserializeOwned>(
    conn: &mut ConnectionManager,
    key: &str,
) -> Result<Vec<T>, AppError> {
    let values: Vec<String> = conn.hvals(key).await?;

    values
        .iter()
        .map(|json| serde_json::from_str(json).map_err(AppError::from))
        .collect()
}

pub async fn get_user(conn: &mut ConnectionManager, id: Uuid) -> Result<User, AppError> {
    get_json(conn, USERS, &id.to_string())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {id}")))
}

pub async fn get_user_by_provider(
    conn: &mut ConnectionManager,
    provider_id: &str,
) -> Result<Option<User>, AppError> {
    let id: Option<String> = conn.hget(USER_PROVIDERS, provider_id).await?;

    match id {
        Some(id) => get_json(conn, USERS, &id).await,
        None => Ok(None),
    }
}

/// Outcome of claiming a provider id for a user record already written.
#[derive(Debug)]
enum Claim {
    Won,
    /// Another account holds the provider id.
    Lost(User),
    /// The provider id points at a record that no longer exists.
    Dangling,
}

fn settle_claim(claimed: bool, holder: Option<User>) -> Claim {
    match (claimed, holder) {
        (true, _) => Claim::Won,
        (false, Some(winner)) => Claim::Lost(winner),
        (false, None) => Claim::Dangling,
    }
}

/// Stores `user` unless its provider id already has an account, in which case
/// that account is returned instead.
pub async fn insert_user(conn: &mut ConnectionManager, user: User) -> Result<User, AppError> {
    let id = user.id.to_string();
    put_json(conn, USERS, &id, &user).await?;

    let claimed: bool = match conn.hset_nx(USER_PROVIDERS, &user.provider_id, &id).await {
        Ok(claimed) => claimed,
        Err(e) => {
            let _: redis::RedisResult<()> = conn.hdel(USERS, &id).await;
            return Err(e.into());
        }
    };

    let holder = if claimed {
        None
    } else {
        get_user_by_provider(conn, &user.provider_id).await?
    };

    match settle_claim(claimed, holder) {
        Claim::Won => Ok(user),
        Claim::Lost(winner) => {
            let _: () = conn.hdel(USERS, &id).await?;
            Ok(winner)
        }
        Claim::Dangling => {
            warn!("Provider id {} had no account, reclaiming", user.provider_id);
            let _: () = conn.hset(USER_PROVIDERS, &user.provider_id, &id).await?;
            Ok(user)
        }
    }
}

pub async fn put_user(conn: &mut ConnectionManager, user: &User) -> Result<(), AppError> {
    put_json(conn, USERS, &user.id.to_string(), user).await
}

pub async fn all_users(conn: &mut ConnectionManager) -> Result<Vec<User>, AppError> {
    all_json(conn, USERS).await
}

/// Removes the user along with every event they authored.
pub async fn delete_user(conn: &mut ConnectionManager, user: &User) -> Result<(), AppError> {
    let authored: Vec<String> = all_events(conn)
        .await?
        .into_iter()
        .filter(|event| event.author == Some(user.id))
        .map(|event| event.slug)
        .collect();

    let mut pipe = redis::pipe();
    pipe.atomic()
        .hdel(USERS, user.id.to_string())
        .ignore()
        .hdel(USER_PROVIDERS, &user.provider_id)
        .ignore();

    if !authored.is_empty() {
        pipe.hdel(EVENTS, authored).ignore();
    }

    let _: () = pipe.query_async(conn).await?;

    Ok(())
}

pub async fn put_users(conn: &mut ConnectionManager, users: &[User]) -> Result<(), AppError> {
    if users.is_empty() {
        return Ok(());
    }

    let mut pipe = redis::pipe();
    pipe.atomic();

    for user in users {
        pipe.hset(USERS, user.id.to_string(), serde_json::to_string(user)?)
            .ignore();
    }

    let _: () = pipe.query_async(conn).await?;

    Ok(())
}

pub async fn get_house(conn: &mut ConnectionManager, house: House) -> Result<HouseView, AppError> {
    let profile: Option<HouseProfile> = get_json(conn, HOUSES, house.as_str()).await?;
    let points: Option<i64> = conn.hget(HOUSE_POINTS, house.as_str()).await?;

    Ok(HouseView {
        name: house,
        points: points.unwrap_or(0),
        profile: profile.unwrap_or_default(),
    })
}

pub async fn all_houses(conn: &mut ConnectionManager) -> Result<Vec<HouseView>, AppError> {
    let points: HashMap<String, i64> = conn.hgetall(HOUSE_POINTS).await?;
    let profiles: HashMap<String, String> = conn.hgetall(HOUSES).await?;

    House::ALL
        .into_iter()
        .map(|house| -> Result<HouseView, AppError> {
            let profile: HouseProfile = profiles
                .get(house.as_str())
                .map(|json| serde_json::from_str(json))
                .transpose()?
                .unwrap_or_default();

            Ok(HouseView {
                name: house,
                points: points.get(house.as_str()).copied().unwrap_or(0),
                profile,
            })
        })
        .collect()
}

pub async fn put_house_profile(
    conn: &mut ConnectionManager,
    house: House,
    profile: &HouseProfile,
) -> Result<(), AppError> {
    put_json(conn, HOUSES, house.as_str(), profile).await
}

pub async fn add_points(
    conn: &mut ConnectionManager,
    house: House,
    delta: i64,
) -> Result<i64, AppError> {
    let points: i64 = conn.hincr(HOUSE_POINTS, house.as_str(), delta).await?;

    Ok(points)
}

pub async fn get_event(conn: &mut ConnectionManager, slug: &str) -> Result<Event, AppError> {
    get_json(conn, EVENTS, slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {slug}")))
}

pub async fn insert_event(conn: &mut ConnectionManager, event: &Event) -> Result<(), AppError> {
    let json = serde_json::to_string(event)?;
    let claimed: bool = conn.hset_nx(EVENTS, &event.slug, json).await?;

    if !claimed {
        return Err(AppError::Conflict(format!("Slug {} is taken", event.slug)));
    }

    Ok(())
}

pub async fn put_event(conn: &mut ConnectionManager, event: &Event) -> Result<(), AppError> {
    put_json(conn, EVENTS, &event.slug, event).await
}

pub async fn all_events(conn: &mut ConnectionManager) -> Result<Vec<Event>, AppError> {
    all_json(conn, EVENTS).await
}

pub async fn delete_event(conn: &mut ConnectionManager, slug: &str) -> Result<(), AppError> {
    let removed: usize = conn.hdel(EVENTS, slug).await?;

    if removed == 0 {
        return Err(AppError::NotFound(format!("Event {slug}")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use roster::Descriptor;

    use super::*;
    use crate::users::Identity;

    fn user(provider_id: &str) -> User {
        User::provision(
            Identity {
                id: provider_id.to_string(),
                name: "Jane Doe".to_string(),
                email: "jane.doe@example.org".to_string(),
                picture: None,
            },
            Descriptor::default(),
            Utc::now(),
        )
    }

    #[test]
    fn test_claim_won() {
        assert!(matches!(settle_claim(true, None), Claim::Won));
    }

    #[test]
    fn test_claim_lost_returns_existing_account() {
        let winner = user("google-1");
        let id = winner.id;

        match settle_claim(false, Some(winner)) {
            Claim::Lost(existing) => assert_eq!(existing.id, id),
            other => panic!("unexpected claim: {other:?}"),
        }
    }

    #[test]
    fn test_dangling_claim_is_reclaimed() {
        assert!(matches!(settle_claim(false, None), Claim::Dangling));
    }
}
