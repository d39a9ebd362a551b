//! Model artifact persistence and serving-side prediction

mod artifact;

pub use artifact::{TrainedModel, FORMAT_VERSION};
