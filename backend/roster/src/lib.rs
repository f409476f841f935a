//! # Roster
//!
//! Roster-derived identity resolution for the house points tracker.
//!
//! ## Pieces
//! - [`compiler`]: batch job reading the house roster spreadsheet (exported as
//!   CSV) and writing a key to descriptor mapping. Runs at deploy time or when
//!   an operator asks for it, never per request.
//! - [`resolver`]: per-request lookup classifying a freshly authenticated
//!   person from their display name and email.
//! - [`naming`]: the key derivation both sides share.
//!
//! ## Data Flow
//! Roster CSV -> [`compiler::compile_to`] -> mapping file -> [`resolver::SharedResolver`]
//! -> user provisioning in the server.
//!
//! ## Mapping File
//! - JSON object, identity key to `{ grade, role, house }`
//! - Keys are either student emails (`jane.doe@prismsus.org`) or bare faculty
//!   name tokens (`Jones`)
//! - Replaced wholesale on every compile, never edited in place
//!
//! ## Notes
//! - Faculty lookups by name token are collision-prone. Collisions are logged
//!   and reported by the compiler, and `--strict` compiles refuse them.
//! - Anyone the roster does not know resolves to grade 9 / `Student` / no
//!   house rather than failing, so provisioning always succeeds.
pub mod compiler;
pub mod descriptor;
pub mod error;
pub mod mapping;
pub mod naming;
pub mod resolver;
pub mod source;

pub use compiler::{Collision, Compiled, HouseLeader, HouseLeaders, compile, compile_to};
pub use descriptor::{Descriptor, Grade, House, Role};
pub use error::RosterError;
pub use mapping::{CompileLock, RosterMapping, read_mapping, write_mapping};
pub use naming::{DEFAULT_EMAIL_DOMAIN, NamingStrategy, PositionalNaming};
pub use resolver::{Overrides, Resolver, SharedResolver};
pub use source::{RosterCell, RosterRow, load_source, read_rows};
