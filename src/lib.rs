//! Content Analysis Pipeline
//!
//! This library provides the core of the content-analysis service: an
//! asynchronous job pipeline that scores social-media images for visual safety
//! risks, aggregates the scores per campaign submission, and attaches a
//! reviewer summary.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
