//! Poll administration and one-vote-per-participant voting.
//!
//! Administrators create polls and manage their options; authenticated
//! participants cast exactly one vote per poll; tallies are computed on
//! demand from the stored votes.
//!
//! Requests enter through [`routes::create_routes`], are authenticated into a
//! [`policy::Actor`] and forwarded to [`Core`], which checks the
//! [`policy::AccessPolicy`] and reads or writes through a [`store::Store`].

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod policy;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;
pub mod tally;
pub mod users;
pub mod views;
pub mod voting;

pub use error::{Error, Result};
pub use service::Core;
