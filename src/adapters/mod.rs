//! Adapters implementing the port traits.
//!
//! `live` talks to real services, `recording` wraps another adapter and
//! captures every call into a cassette, `replaying` serves calls from one.

pub mod live;
pub mod recording;
pub mod replaying;
