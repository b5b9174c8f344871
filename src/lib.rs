//! Flow Guardian - never lose your train of thought
//!
//! Flow Guardian saves snapshots of what you are working on, together with
//! the state of your git repository, and restores them later with a
//! summary of what changed while you were away. Short learnings can be
//! recorded alongside and optionally shared with a team.

pub mod capture;
pub mod cli;
pub mod config;
pub mod git;
pub mod restore;
pub mod storage;
pub mod summarize;
pub mod team;
