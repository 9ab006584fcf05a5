//! # Audio Module
//!
//! Per-guild playback for Progressive Jukebox.
//!
//! ## Architecture
//!
//! ### [`session`] - Playback Session
//! - Queue, current track and voice connection of one guild
//! - State machine: idle, connected, playing, paused
//! - Track generations so late completion events are dropped
//!
//! ### [`registry`] - Session Registry
//! - Guild-keyed sessions, created on first use and reused after leaving
//! - The dispatcher task applying track-end events
//!
//! ### [`reaper`] - Idle Reaper
//! - Leaves voice channels that stayed without listeners past the timeout
//!
//! ### [`player`] - Command facade
//! - Resolves queries through the extractor, then drives the session
//!
//! ### [`voice`] - Songbird transport
//! - Implements the [`transport`] seams on top of songbird calls

pub mod player;
pub mod queue;
pub mod reaper;
pub mod registry;
pub mod session;
pub mod track;
pub mod transport;
pub mod voice;
