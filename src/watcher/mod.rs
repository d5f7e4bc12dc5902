//! Background tasks. Streaming and voter watchers run one per session and
//! exit when the session expires or is stopped; the reaper is global.

pub mod reaper;
pub mod streaming;
pub mod voters;
