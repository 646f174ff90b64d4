//! Roster lifecycle
//!
//! Reconciles an asynchronously refreshed roster with locally owned,
//! time-bounded visual states. The [`RosterController`] composes four
//! parts:
//!
//! - [`MembershipTracker`]: previous-vs-current snapshot diffing
//! - [`EntranceAnimator`]: one entrance cycle per designated creation
//! - [`ExitAnimator`]: confirm, animate out, then delete
//! - [`TimerRegistry`]: at most one live timer per `(id, phase)`

pub mod controller;
pub mod entrance;
pub mod exit;
pub mod membership;
pub mod state;
pub mod timers;

pub use controller::RosterController;
pub use entrance::{EntranceAnimator, EntranceState, EntranceStep, EntranceTimings};
pub use exit::{ExitAnimator, ExitState};
pub use membership::{MembershipTracker, RosterDiff, diff};
pub use state::{EntityId, LifecycleEvent, Notification, RenderedEntity, TimerPhase, VisualState};
pub use timers::{FiredTimer, TimerRegistry};
