//! Shared synthetic survey fixtures

#![allow(dead_code)]

use polars::prelude::*;
use satisfaction_pipeline::config::PipelineConfig;
use satisfaction_pipeline::utils::DataSaver;
use std::path::Path;

/// Raw survey rows shaped like the airline dataset. Satisfaction follows
/// travel type and the wifi rating with a little label noise.
pub fn survey(n: usize) -> DataFrame {
    let genders: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "Male" } else { "Female" }).collect();
    let customer: Vec<&str> = (0..n)
        .map(|i| if i % 5 == 0 { "disloyal Customer" } else { "Loyal Customer" })
        .collect();
    let travel: Vec<&str> = (0..n)
        .map(|i| if i % 3 == 0 { "Personal Travel" } else { "Business travel" })
        .collect();
    let class: Vec<&str> = (0..n).map(|i| ["Business", "Eco", "Eco Plus"][i % 3]).collect();
    let age: Vec<i64> = (0..n).map(|i| 8 + (i as i64 * 7) % 70).collect();
    let distance: Vec<i64> = (0..n)
        .map(|i| if i % 50 == 49 { 25_000 } else { 100 + (i as i64 * 137) % 3000 })
        .collect();
    let wifi: Vec<i64> = (0..n).map(|i| (i as i64 * 3) % 6).collect();
    let checkin: Vec<i64> = (0..n).map(|i| 1 + (i as i64 % 5)).collect();
    let departure: Vec<i64> = (0..n).map(|i| (i as i64 * 11) % 90).collect();
    let arrival: Vec<Option<f64>> = (0..n)
        .map(|i| if i % 17 == 0 { None } else { Some(((i * 13) % 95) as f64) })
        .collect();
    let satisfaction: Vec<&str> = (0..n)
        .map(|i| {
            if (i % 3 != 0 && (i * 3) % 6 >= 3) || i % 23 == 0 {
                "satisfied"
            } else {
                "neutral or dissatisfied"
            }
        })
        .collect();

    df!(
        "MyUnknownColumn" => (0..n as i64).collect::<Vec<_>>(),
        "id" => (1000..1000 + n as i64).collect::<Vec<_>>(),
        "Gender" => genders,
        "Customer Type" => customer,
        "Age" => age,
        "Type of Travel" => travel,
        "Class" => class,
        "Flight Distance" => distance,
        "Inflight wifi service" => wifi,
        "Checkin service" => checkin,
        "Departure Delay in Minutes" => departure,
        "Arrival Delay in Minutes" => arrival,
        "satisfaction" => satisfaction
    )
    .unwrap()
}

/// Config rooted in `dir` with the raw file and a small grid written.
pub fn workspace(dir: &Path, rows: usize, grid: &str) -> PipelineConfig {
    let params = dir.join("params.json");
    std::fs::write(&params, grid).unwrap();
    let config = PipelineConfig::new()
        .with_artifacts_dir(dir)
        .with_params_file(params)
        .with_k(8)
        .with_tracking(false);
    let mut raw = survey(rows);
    DataSaver::save_csv(&mut raw, &config.paths.raw_data).unwrap();
    config
}
