//! # Roster Compiler
//!
//! Batch job turning house rosters into a [`RosterMapping`].
//!
//! ## Per Cell
//! 1. Skip cells without an occupant.
//! 2. Grade cell containing `F` or `S` is a staff label, anything else is a
//!    student grade.
//! 3. Students are keyed by derived email. Matching the house's configured
//!    student leader email makes them `HouseLeader`.
//! 4. Faculty are keyed by surname token, grade `Faculty`. Matching the house's
//!    configured faculty leader name makes them `HouseLeader`.
//!
//! ## Collisions
//! Two occupants reducing to the same key overwrite each other, later rows
//! winning. Every overwrite is reported in [`Compiled::collisions`] and logged.
//! Strict compilation refuses to persist a mapping with collisions.
use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    descriptor::{Descriptor, Grade, House, Role},
    error::{Result, RosterError},
    mapping::{CompileLock, RosterMapping, write_mapping},
    naming::NamingStrategy,
    source::{RosterCell, RosterRow, load_source},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseLeader {
    /// Student leader's school email.
    pub student: Option<String>,
    /// Faculty leader's full roster name.
    pub faculty: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseLeaders {
    #[serde(default)]
    pub albemarle: HouseLeader,
    #[serde(default)]
    pub lambert: HouseLeader,
    #[serde(default)]
    pub hobler: HouseLeader,
    #[serde(default)]
    pub ettl: HouseLeader,
}

impl HouseLeaders {
    pub fn get(&self, house: House) -> Option<&HouseLeader> {
        match house {
            House::Albemarle => Some(&self.albemarle),
            House::Lambert => Some(&self.lambert),
            House::Hobler => Some(&self.hobler),
            House::Ettl => Some(&self.ettl),
            House::None => None,
        }
    }

    pub fn get_mut(&mut self, house: House) -> Option<&mut HouseLeader> {
        match house {
            House::Albemarle => Some(&mut self.albemarle),
            House::Lambert => Some(&mut self.lambert),
            House::Hobler => Some(&mut self.hobler),
            House::Ettl => Some(&mut self.ettl),
            House::None => None,
        }
    }

    fn is_student_leader(&self, house: House, email: &str) -> bool {
        self.get(house)
            .and_then(|leader| leader.student.as_deref())
            .is_some_and(|leader| leader == email)
    }

    fn is_faculty_leader(&self, house: House, name: &str) -> bool {
        self.get(house)
            .and_then(|leader| leader.faculty.as_deref())
            .is_some_and(|leader| leader == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
    pub key: String,
    pub line: usize,
    pub previous: Descriptor,
    pub replacement: Descriptor,
}

#[derive(Debug, Clone, Default)]
pub struct Compiled {
    pub mapping: RosterMapping,
    pub collisions: Vec<Collision>,
}

fn is_staff_label(grade: &str) -> bool {
    grade.contains('F') || grade.contains('S')
}

fn classify(
    line: usize,
    house: House,
    grade: &str,
    name: &str,
    leaders: &HouseLeaders,
    naming: &dyn NamingStrategy,
) -> Result<(String, Descriptor)> {
    if is_staff_label(grade) {
        let key = naming
            .faculty_key(name)
            .ok_or_else(|| RosterError::source_format(line, format!("no usable name in {name:?}")))?;

        let role = if leaders.is_faculty_leader(house, name) {
            Role::HouseLeader
        } else {
            Role::Faculty
        };

        return Ok((key, Descriptor::new(Grade::Faculty, role, house)));
    }

    let grade = grade
        .parse::<Grade>()
        .ok()
        .filter(Grade::is_student)
        .ok_or_else(|| {
            RosterError::source_format(line, format!("{grade:?} is not a student grade for {name}"))
        })?;

    let key = naming.student_key(name);
    let role = if leaders.is_student_leader(house, &key) {
        Role::HouseLeader
    } else {
        Role::Student
    };

    Ok((key, Descriptor::new(grade, role, house)))
}

pub fn compile(
    rows: &[RosterRow],
    leaders: &HouseLeaders,
    naming: &dyn NamingStrategy,
) -> Result<Compiled> {
    let mut compiled = Compiled::default();

    for row in rows {
        for (house, RosterCell { grade, name }) in row.houses() {
            let Some(name) = name else {
                continue;
            };

            let grade = grade.as_deref().ok_or_else(|| {
                RosterError::source_format(row.line, format!("{name} in {house} has no grade"))
            })?;

            let (key, descriptor) = classify(row.line, house, grade, name, leaders, naming)?;

            #[cfg(feature = "verbose")]
            tracing::debug!("{key} -> {descriptor}");

            if let Some(previous) = compiled.mapping.insert(key.clone(), descriptor) {
                warn!(
                    "Row {}: {key} already mapped to \"{previous}\", replacing with \"{descriptor}\"",
                    row.line
                );

                compiled.collisions.push(Collision {
                    key,
                    line: row.line,
                    previous,
                    replacement: descriptor,
                });
            }
        }
    }

    Ok(compiled)
}

/// Loads, compiles and persists a roster under the output's compile lock.
///
/// Nothing is written unless every row compiles, and with `strict` set, unless
/// no two occupants share a key.
pub async fn compile_to(
    location: &str,
    output: &Path,
    leaders: &HouseLeaders,
    naming: &dyn NamingStrategy,
    strict: bool,
    timeout: Duration,
) -> Result<Compiled> {
    let _lock = CompileLock::acquire(output)?;

    info!("Loading roster from {location}");
    let rows = load_source(location, timeout).await?;

    let compiled = compile(&rows, leaders, naming)?;
    info!(
        "Compiled {} rows into {} keys ({} collisions)",
        rows.len(),
        compiled.mapping.len(),
        compiled.collisions.len()
    );

    if strict && !compiled.collisions.is_empty() {
        return Err(RosterError::Collisions(compiled.collisions));
    }

    write_mapping(output, &compiled.mapping)?;

    Ok(compiled)
}
