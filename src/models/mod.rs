//! Data models and pure translations between the declared records and the
//! wire shapes of the admin and data-plane APIs.
//!
//! Nothing in this module performs I/O, so every translation can be tested
//! without a gateway.

pub mod admin;
pub mod bucket;
pub mod lifecycle;
pub mod manifest;
pub mod mutability;
pub mod policy;
pub mod user;
