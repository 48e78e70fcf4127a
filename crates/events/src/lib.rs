//! Room-scoped publish/subscribe for live quiz play.
//!
//! - [`RoomBroadcaster`] — per-room fan-out hub backed by
//!   `tokio::sync::broadcast` channels, one per room id.
//! - [`RoomId`] — typed room keys (one room per game pin, battle, and
//!   tournament).
//! - [`RoomEvent`] — the tagged union of every wire payload.

pub mod payload;
pub mod room;

pub use payload::{BracketBattleView, PlayerView, QuestionView, RoomEvent};
pub use room::{RoomBroadcaster, RoomId, DEFAULT_ROOM_CAPACITY};
