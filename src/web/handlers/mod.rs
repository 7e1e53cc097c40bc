pub mod analyze;
pub mod auth;
pub mod groups;
pub mod search;
pub mod status;
pub mod topics;
