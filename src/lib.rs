//! Admin console core for the Passiify marketplace: role-aware API client and
//! the partner settlement view.

pub mod api;
pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod model;
pub mod settlement;
pub mod view;
