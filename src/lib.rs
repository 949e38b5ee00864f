//! Work-breakdown tree engine.
//!
//! Flat node records become an ordered forest ([`services::tree`]), which is
//! edited with pure functions ([`services::mutator`]), scheduled from its
//! dependencies ([`services::scheduler`], [`services::dependencies`]) and
//! projected onto a status board ([`services::board`]). A
//! [`services::session::Session`] ties these to a persistence collaborator.

pub mod config;
pub mod models;
pub mod services;
pub mod storage;
