//! Movie recommendations from an SVD collaborative-filtering model, served
//! through an HTML dashboard and a small JSON API.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod services;
