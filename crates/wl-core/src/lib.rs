//! Core analytics engine for the watch tracker.
//!
//! Everything here is a pure computation over an immutable [`ProfileSnapshot`]:
//! - Status rollups: episode → season → show watch status
//! - Progress aggregation, activity timelines, velocity, binges, streaks
//! - Milestones and achievements, abandonment risk and discovery
//! - Composition into profile, account, and platform-wide responses
//!
//! No I/O happens in this crate; storage lives in `wl-db`.

pub mod admin;
pub mod binge;
pub mod catalog;
pub mod compose;
pub mod event;
pub mod milestones;
pub mod progress;
pub mod risk;
pub mod snapshot;
pub mod status;
pub mod streak;
pub mod timeline;
pub mod types;
pub mod velocity;

pub use compose::{
    account_statistics, profile_statistics, AccountStatistics, AnalyzerConfig, ProfileStatistics,
    Section, SectionKind, SectionRequest,
};
pub use event::{WatchEvent, WatchTarget};
pub use snapshot::ProfileSnapshot;
pub use status::{BinaryWatchStatus, WatchStatus};
pub use types::{AccountId, EpisodeId, MovieId, Percent, ProfileId, ShowId};
