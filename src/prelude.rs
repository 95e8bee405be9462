//! Convenience re-exports for driving a swarm from Rust.
//!
//! ```rust
//! use notesync_swarm::prelude::*;
//! ```

pub use crate::catalog::{TaskCatalog, TaskKind, TaskWeights};
pub use crate::config::{SwarmConfiguration, SwarmDefault, SwarmDefaultType};
pub use crate::logger::SwarmLogFormat;
pub use crate::metrics::{Outcome, SwarmMetrics};
pub use crate::{AttackPhase, SwarmAttack, SwarmError};
