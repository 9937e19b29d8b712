//! obrcast — client for the OBR Forecast Impact Estimator API.
//!
//! Talks to the remote PolicyEngine-backed simulation service: loads
//! forecast metadata and default growth-rate assumptions, submits impact
//! analyses (official forecast or custom growth-rate scenario), polls
//! asynchronous computations to completion, and transforms the returned
//! yearly/decile metrics for display — in the terminal or via the embedded
//! local web dashboard.

pub mod api;
pub mod cli;
pub mod config;
pub mod rates;
pub mod session;
pub mod transform;
pub mod web;
