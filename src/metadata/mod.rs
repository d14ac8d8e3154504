//! Tag embedding for cached audio files.

pub mod tag_writer;
