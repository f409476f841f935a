//! # Houses
//!
//! The four fixed houses. Points live in their own Redis hash so awarding
//! points is a single atomic `HINCRBY`.
//!
//! ## Redis
//! - `house_points`: house name -> points (**int**)
//! - `houses`: house name -> JSON [`HouseProfile`]
use roster::House;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, users::User};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseProfile {
    #[serde(default)]
    pub motto: String,
    #[serde(default)]
    pub en_motto: String,
    #[serde(default = "default_color")]
    pub color: String,
    /// Crest image URL.
    pub crest: Option<String>,
}

fn default_color() -> String {
    "white".to_string()
}

impl Default for HouseProfile {
    fn default() -> Self {
        Self {
            motto: String::new(),
            en_motto: String::new(),
            color: default_color(),
            crest: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HouseView {
    pub name: House,
    pub points: i64,
    #[serde(flatten)]
    pub profile: HouseProfile,
}

#[derive(Debug, Deserialize)]
pub struct PointsDelta {
    pub points: i64,
}

#[derive(Debug, Serialize)]
pub struct Leaders {
    pub faculty: Vec<User>,
    pub student: Vec<User>,
}

/// Only real houses are addressable.
pub fn parse_house(name: &str) -> Result<House, AppError> {
    match name.parse::<House>() {
        Ok(House::None) | Err(_) => Err(AppError::NotFound(format!("House {name}"))),
        Ok(house) => Ok(house),
    }
}

pub fn leaders(house: House, users: Vec<User>) -> Leaders {
    let (faculty, student): (Vec<User>, Vec<User>) = users
        .into_iter()
        .filter(|user| user.is_leader_of(house))
        .partition(|user| !user.grade.is_student());

    Leaders { faculty, student }
}
