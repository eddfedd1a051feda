//! Data Transfer Objects
//!
//! Wire-level representations exchanged with the generation pipeline's
//! change feed and control API, plus the view handed to UI consumers.

pub mod job;
pub mod realtime;
