//! # Descriptors
//!
//! The resolved `(grade, role, house)` classification of a person.
//!
//! Stored in the mapping file as a structured record. Older mapping files kept
//! each descriptor as one space-joined string (`"12 Student Lambert"`), so the
//! deserializer accepts both forms.
use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorParseError {
    #[error("Unknown grade: {0}")]
    Grade(String),

    #[error("Unknown role: {0}")]
    Role(String),

    #[error("Unknown house: {0}")]
    House(String),

    #[error("Expected \"<grade> <role> <house>\", got {0:?}")]
    Shape(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    Admin,
    Faculty,
    #[serde(rename = "12")]
    Twelve,
    #[serde(rename = "11")]
    Eleven,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "9")]
    Nine,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Admin => "Admin",
            Grade::Faculty => "Faculty",
            Grade::Twelve => "12",
            Grade::Eleven => "11",
            Grade::Ten => "10",
            Grade::Nine => "9",
        }
    }

    pub fn is_student(&self) -> bool {
        !matches!(self, Grade::Admin | Grade::Faculty)
    }

    /// Grade after a school-year rollover. Seniors have nowhere to go and
    /// return `None`; staff grades are unchanged.
    pub fn promoted(&self) -> Option<Grade> {
        match self {
            Grade::Nine => Some(Grade::Ten),
            Grade::Ten => Some(Grade::Eleven),
            Grade::Eleven => Some(Grade::Twelve),
            Grade::Twelve => None,
            staff => Some(*staff),
        }
    }
}

impl FromStr for Grade {
    type Err = DescriptorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Grade::Admin),
            "Faculty" => Ok(Grade::Faculty),
            "12" => Ok(Grade::Twelve),
            "11" => Ok(Grade::Eleven),
            "10" => Ok(Grade::Ten),
            "9" => Ok(Grade::Nine),
            other => Err(DescriptorParseError::Grade(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Faculty,
    HouseLeader,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Faculty => "Faculty",
            Role::HouseLeader => "HouseLeader",
            Role::Student => "Student",
        }
    }
}

impl FromStr for Role {
    type Err = DescriptorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Faculty" => Ok(Role::Faculty),
            "HouseLeader" => Ok(Role::HouseLeader),
            "Student" => Ok(Role::Student),
            other => Err(DescriptorParseError::Role(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum House {
    None,
    Albemarle,
    Lambert,
    Hobler,
    Ettl,
}

impl House {
    /// Real houses, in roster column order.
    pub const ALL: [House; 4] = [House::Albemarle, House::Lambert, House::Hobler, House::Ettl];

    pub fn as_str(&self) -> &'static str {
        match self {
            House::None => "None",
            House::Albemarle => "Albemarle",
            House::Lambert => "Lambert",
            House::Hobler => "Hobler",
            House::Ettl => "Ettl",
        }
    }
}

impl FromStr for House {
    type Err = DescriptorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(House::None),
            "Albemarle" => Ok(House::Albemarle),
            "Lambert" => Ok(House::Lambert),
            "Hobler" => Ok(House::Hobler),
            "Ettl" => Ok(House::Ettl),
            other => Err(DescriptorParseError::House(other.to_string())),
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(Grade, Role, House);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Descriptor {
    pub grade: Grade,
    pub role: Role,
    pub house: House,
}

impl Descriptor {
    pub const fn new(grade: Grade, role: Role, house: House) -> Self {
        Self { grade, role, house }
    }
}

impl Default for Descriptor {
    /// Least-privileged classification for anyone the roster does not know.
    fn default() -> Self {
        Self::new(Grade::Nine, Role::Student, House::None)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.grade, self.role, self.house)
    }
}

impl FromStr for Descriptor {
    type Err = DescriptorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(' ').collect();

        let [grade, role, house] = parts.as_slice() else {
            return Err(DescriptorParseError::Shape(s.to_string()));
        };

        Ok(Self {
            grade: grade.parse()?,
            role: role.parse()?,
            house: house.parse()?,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredDescriptor {
    Structured { grade: Grade, role: Role, house: House },
    Legacy(String),
}

impl<'de> Deserialize<'de> for Descriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match StoredDescriptor::deserialize(deserializer)? {
            StoredDescriptor::Structured { grade, role, house } => Ok(Self { grade, role, house }),
            StoredDescriptor::Legacy(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
