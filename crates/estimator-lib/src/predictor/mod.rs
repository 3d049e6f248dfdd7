//! Prediction engine
//!
//! Re-applies the training-time encoding to a single request, runs the
//! regressor and maps the log-space output back to a price.

mod error;
mod payload;
mod service;

pub use error::PredictError;
pub use payload::parse_payload;
pub use service::PredictionService;
