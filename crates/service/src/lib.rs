//! Estato prediction service
//!
//! HTTP front end over [`estimator_lib::PredictionService`].

pub mod api;
pub mod config;
