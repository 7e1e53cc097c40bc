// Topical: topic analysis for chat records
//
// This is the library root. Each module corresponds to a major subsystem:
// configuration, the analysis client, storage, the session host and its
// web surface.

pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod output;
pub mod records;
pub mod session;
pub mod status;
pub mod topics;
pub mod web;
