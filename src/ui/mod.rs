//! Everything the bot shows in text channels: embeds, the progress bar and
//! the live now-playing message with its update schedule.

pub mod display;
pub mod embeds;
pub mod interval;
pub mod progress_bar;
pub mod reporter;
