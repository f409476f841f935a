//! # Roster Compilation
//!
//! Operator entry point for the roster compiler.
//!
//! ```sh
//! compile assets/HouseRosters.csv --leaders config/leaders.json --output config/roster.json
//! ```
//!
//! ## Leaders File
//! ```json
//! {
//!   "albemarle": { "student": "jane.doe@prismsus.org", "faculty": "Kenneth Jones" },
//!   "lambert": { "student": null, "faculty": null }
//! }
//! ```
//! Houses left out have no configured leaders.
//!
//! ## Notes
//! - Runs are serialized through an OS lock on `<output>.lock`; a second run
//!   while one is in progress fails fast.
//! - A running server picks up the new mapping on `POST /roster/reload`.
use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use roster::{HouseLeaders, PositionalNaming, RosterError, compile_to};

pub struct Options {
    pub source: String,
    pub output: PathBuf,
    pub leaders: Option<PathBuf>,
    pub domain: String,
    pub strict: bool,
    pub timeout: u64,
}

pub fn load_leaders(path: Option<&PathBuf>) -> Result<HouseLeaders> {
    let Some(path) = path else {
        return Ok(HouseLeaders::default());
    };

    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;

    serde_json::from_slice(&data).with_context(|| format!("parsing {}", path.display()))
}

pub async fn compile_roster(options: Options) -> Result<()> {
    let leaders = load_leaders(options.leaders.as_ref())?;
    let naming = PositionalNaming::new(&options.domain);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Compiling {}", options.source));

    let result = compile_to(
        &options.source,
        &options.output,
        &leaders,
        &naming,
        options.strict,
        Duration::from_secs(options.timeout),
    )
    .await;

    pb.finish_and_clear();

    let compiled = match result {
        Err(RosterError::Collisions(collisions)) => {
            for collision in &collisions {
                println!(
                    "Row {}: {} maps to both \"{}\" and \"{}\"",
                    collision.line, collision.key, collision.previous, collision.replacement
                );
            }
            anyhow::bail!("{} collisions, mapping not written", collisions.len());
        }
        other => other?,
    };

    println!("Compiled Keys: {}", compiled.mapping.len());
    println!("Collisions: {}", compiled.collisions.len());
    println!("Written To: {}", options.output.display());

    #[cfg(feature = "verbose")]
    for (key, descriptor) in compiled.mapping.iter() {
        println!("{key}: {descriptor}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_leaders_file_is_default() {
        assert_eq!(load_leaders(None).unwrap(), HouseLeaders::default());
    }

    #[test]
    fn test_partial_leaders_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("leaders.json");
        fs::write(&path, r#"{"hobler": {"student": null, "faculty": "Jay May"}}"#).unwrap();

        let leaders = load_leaders(Some(&path)).unwrap();

        assert_eq!(leaders.hobler.faculty.as_deref(), Some("Jay May"));
        assert_eq!(leaders.albemarle, Default::default());
    }
}
