//! Alert engines: candidate filters, the notification deduper, the sweeps
//! that drive them, and the portfolio maths the HTTP layer uses.

pub mod dedup;
pub mod evaluation;
pub mod portfolio;
pub mod sweep;

pub use dedup::{DedupOutcome, NotificationDeduper};
pub use sweep::{run_sweep, SweepKind, SweepOutcome, SweepReport};
