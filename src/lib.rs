#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// #![warn(clippy::cargo)]

pub mod calibrate;
pub mod checkpoint;
pub mod dataset;
pub mod error;
pub mod estimator;
pub mod network;
pub mod partition;
pub mod pmf;

pub use error::{Error, Result};
pub use estimator::{Estimate, Estimator, EstimatorBuilder, Request};
pub use network::Network;
pub use partition::Interval;
