//! Instrument state shared between the scheduler and the presentation layer.

mod snapshot;
mod store;

pub use snapshot::{InstrumentSnapshot, KindData};
pub use store::{ApplyOutcome, InstrumentStateStore, VersionChanges};
