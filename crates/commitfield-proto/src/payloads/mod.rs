//! Payload bodies carried inside frames and REST responses.
//!
//! Field names follow the backend's camelCase JSON. Optional fields default to
//! `None` so older server builds that omit them still decode.

pub mod chat;
pub mod notification;
pub mod rest;
pub mod stats;
