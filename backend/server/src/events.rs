//! # Events
//!
//! House competitions and their results.
//!
//! ## Lifecycle
//! - **Upcoming**: no end date yet, or the end date has not passed
//! - **Waiting result**: ended, no result posted
//! - **Result posted**: result is up on the leaderboard (or forced up)
//! - **Past**: result taken down from the leaderboard
//!
//! Status is derived from the clock on every read rather than stored, so an
//! event rolls from upcoming to waiting result without a background job.
//!
//! ## Redis
//! - `events`: slug -> JSON [`Event`], slugs claimed with `HSETNX`
use chrono::{DateTime, Utc};
use roster::House;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    I,
    II,
    III,
    IV,
    Others,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventStatus {
    Upcoming,
    WaitingResult,
    ResultPosted,
    Past,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct HouseResult {
    pub albemarle: i64,
    pub lambert: i64,
    pub hobler: i64,
    pub ettl: i64,
}

impl HouseResult {
    pub fn points(&self, house: House) -> i64 {
        match house {
            House::Albemarle => self.albemarle,
            House::Lambert => self.lambert,
            House::Hobler => self.hobler,
            House::Ettl => self.ettl,
            House::None => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Posting {
    pub waiting_result: bool,
    pub active: bool,
    pub force_active: bool,
    pub posted_date: Option<DateTime<Utc>>,
}

impl Default for Posting {
    fn default() -> Self {
        Self {
            waiting_result: true,
            active: false,
            force_active: false,
            posted_date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub slug: String,
    pub title: String,
    pub author: Option<Uuid>,
    #[serde(default)]
    pub hosts: Vec<Uuid>,
    pub tier: Option<Tier>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    /// Cover image URL.
    pub thumbnail: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub sign_up_link: Option<String>,
    pub is_for_all: bool,
    #[serde(default)]
    pub participants: Vec<Uuid>,
    #[serde(default)]
    pub admin_note: String,
    pub result: Option<HouseResult>,
    #[serde(default)]
    pub posting: Posting,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub slug: String,
    pub title: String,
    pub author: Option<Uuid>,
    #[serde(default)]
    pub hosts: Vec<Uuid>,
    pub tier: Option<Tier>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    pub thumbnail: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub sign_up_link: Option<String>,
    pub is_for_all: Option<bool>,
    #[serde(default)]
    pub participants: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultUpdate {
    pub result: HouseResult,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub force_active: bool,
    pub admin_note: Option<String>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<EventStatus>,
}

impl Event {
    pub fn create(new: NewEvent, now: DateTime<Utc>) -> Result<Self, AppError> {
        if new.title.trim().is_empty() || new.slug.trim().is_empty() {
            return Err(AppError::MalformedPayload(
                "Title and slug are required".to_string(),
            ));
        }

        if let (Some(start), Some(end)) = (new.start_date, new.end_date) {
            if start > end {
                return Err(AppError::MalformedPayload(
                    "Start date should be before end date".to_string(),
                ));
            }
        }

        Ok(Self {
            slug: new.slug.trim().to_string(),
            title: new.title,
            author: new.author,
            hosts: new.hosts,
            tier: new.tier,
            summary: new.summary,
            content: new.content,
            thumbnail: new.thumbnail,
            start_date: new.start_date,
            end_date: new.end_date,
            sign_up_link: new.sign_up_link,
            is_for_all: new.is_for_all.unwrap_or(true),
            participants: new.participants,
            admin_note: String::new(),
            result: None,
            posting: Posting::default(),
            created_at: now,
        })
    }

    pub fn status(&self, now: DateTime<Utc>) -> EventStatus {
        if self.end_date.is_none_or(|end| end >= now) {
            return EventStatus::Upcoming;
        }

        if self.posting.waiting_result {
            EventStatus::WaitingResult
        } else if self.posting.active || self.posting.force_active {
            EventStatus::ResultPosted
        } else {
            EventStatus::Past
        }
    }

    pub fn post_result(&mut self, update: ResultUpdate, now: DateTime<Utc>) {
        if self.posting.waiting_result || self.posting.posted_date.is_none() {
            self.posting.posted_date = Some(now);
        }

        self.result = Some(update.result);
        self.posting.waiting_result = false;
        self.posting.active = update.active;
        self.posting.force_active = update.force_active;

        if let Some(note) = update.admin_note {
            self.admin_note = note;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub status: EventStatus,
}

impl EventView {
    pub fn at(event: Event, now: DateTime<Utc>) -> Self {
        let status = event.status(now);

        Self { event, status }
    }
}
