//! Utility functions and types

pub mod data_loader;
pub mod frame;
pub mod stats;

pub use data_loader::{DataLoader, DataSaver};
pub use frame::{
    column_f64, column_f64_strict, column_names, column_str, column_to_array1, columns_to_array2, require_columns,
    select_rows, take_rows,
};
pub use stats::{median, quantile, quartiles};

use std::time::{Duration, Instant};

/// Wall-clock timer for stage logging
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
