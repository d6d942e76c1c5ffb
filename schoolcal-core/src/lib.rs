//! Core of the school calendar pipeline.
//!
//! - `store` keeps the canonical, deduplicated event set
//! - `schedule` and `calendar_view` derive per-child facts and month views
//! - `snapshot` assembles and validates the published document
//! - `publish` and `verify` push it out and check the copies agree
//! - `pipeline` ties these into runs

pub mod baseline;
pub mod calendar_view;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod extract;
pub mod ledger;
pub mod lock;
pub mod notice;
pub mod pipeline;
pub mod process;
pub mod publish;
pub mod retry;
pub mod roster;
pub mod schedule;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod verify;

pub use error::{SchoolCalError, SchoolCalResult};
pub use event::{Category, Event, EventKey};
pub use notice::{Notice, NoticeStore, Priority};
pub use roster::Roster;
pub use snapshot::Snapshot;
pub use store::EventStore;
