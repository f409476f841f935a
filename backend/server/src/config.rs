use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr, time::Duration};

use roster::{DEFAULT_EMAIL_DOMAIN, House, HouseLeaders};
use tracing::{info, warn};

use crate::error::AppError;

pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub roster_source: String,
    pub roster_map_path: PathBuf,
    pub roster_overrides_path: Option<PathBuf>,
    pub email_domain: String,
    pub fetch_timeout: Duration,
    pub strict_compile: bool,
    pub leaders: HouseLeaders,
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        Ok(Self {
            port: try_load("RUST_PORT", "8080")?,
            redis_url: match read_secret("REDIS_URL") {
                Some(url) => url,
                None => try_load("REDIS_URL", "redis://redis:6379")?,
            },
            roster_source: try_load("ROSTER_SOURCE", "assets/HouseRosters.csv")?,
            roster_map_path: try_load("ROSTER_MAP_PATH", "config/roster.json")?,
            roster_overrides_path: var("ROSTER_OVERRIDES_PATH").ok().map(PathBuf::from),
            email_domain: try_load("ROSTER_EMAIL_DOMAIN", DEFAULT_EMAIL_DOMAIN)?,
            fetch_timeout: Duration::from_secs(try_load("ROSTER_FETCH_TIMEOUT_SECS", "30")?),
            strict_compile: try_load("ROSTER_STRICT", "false")?,
            leaders: load_leaders(),
        })
    }
}

/// `ALBEMARLE_STUDENT_LEADER`, `ALBEMARLE_FACULTY_LEADER`, ... per house.
fn load_leaders() -> HouseLeaders {
    let mut leaders = HouseLeaders::default();

    for house in House::ALL {
        let prefix = house.as_str().to_uppercase();

        if let Some(leader) = leaders.get_mut(house) {
            leader.student = var(&format!("{prefix}_STUDENT_LEADER")).ok();
            leader.faculty = var(&format!("{prefix}_FACULTY_LEADER")).ok();
        }
    }

    leaders
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, AppError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid {key} value: {e}")))
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path).map(|s| s.trim().to_string()).ok()
}
