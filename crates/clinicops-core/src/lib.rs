//! Clinic Ops Core — event store abstractions.
//!
//! This crate defines the event record, the storage-agnostic repository
//! contract and the publisher port that every backend and host depends on.
//! It contains no infrastructure code.

pub mod clock;
pub mod error;
pub mod event;
pub mod publisher;
pub mod repository;
