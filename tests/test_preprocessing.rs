//! Integration test: cleaning, feature building, encoding and selection

mod common;

use polars::prelude::*;
use satisfaction_pipeline::config::{CleaningConfig, FeatureConfig};
use satisfaction_pipeline::error::ErrorKind;
use satisfaction_pipeline::preprocessing::{AgeGroup, Cleaner, FeatureBuilder, FeatureSelector, LabelEncoder};
use satisfaction_pipeline::utils::{column_f64, column_f64_strict, column_names, column_str, quartiles};

#[test]
fn test_clipped_values_stay_within_bounds() {
    let raw = common::survey(300);
    let (cleaned, stats) = Cleaner::default().clean(&raw).unwrap();

    for column in &CleaningConfig::default().outlier_columns {
        let before: Vec<f64> = column_f64(&raw, column).unwrap().into_iter().flatten().collect();
        let (q1, q3) = quartiles(&before).unwrap();
        let iqr = q3 - q1;
        let bounds = stats.bounds_for(column).unwrap();
        assert!((bounds.lower - (q1 - 1.5 * iqr)).abs() < 1e-9);
        assert!((bounds.upper - (q3 + 1.5 * iqr)).abs() < 1e-9);

        for v in column_f64(&cleaned, column).unwrap().into_iter().flatten() {
            assert!(bounds.contains(v), "{} = {} escaped clipping", column, v);
        }
    }
    // Rows are clipped, never removed
    assert_eq!(cleaned.height(), raw.height());
}

#[test]
fn test_imputation_leaves_no_missing_values() {
    let raw = common::survey(120);
    assert!(raw.column("Arrival Delay in Minutes").unwrap().null_count() > 0);

    let (cleaned, stats) = Cleaner::default().clean(&raw).unwrap();
    assert_eq!(cleaned.column("Arrival Delay in Minutes").unwrap().null_count(), 0);
    assert!(stats.median_for("Arrival Delay in Minutes").is_some());
    assert!(cleaned.column("id").is_err());
    assert!(cleaned.column("MyUnknownColumn").is_err());
}

#[test]
fn test_stored_stats_are_not_refit_on_new_rows() {
    let train = common::survey(200);
    let (_, stats) = Cleaner::default().clean(&train).unwrap();

    let extreme = df!(
        "MyUnknownColumn" => [0i64],
        "id" => [1i64],
        "Flight Distance" => [1_000_000.0],
        "Departure Delay in Minutes" => [-50.0],
        "Arrival Delay in Minutes" => [None::<f64>],
        "Checkin service" => [3.0]
    )
    .unwrap();
    let applied = Cleaner::apply(&extreme, &stats).unwrap();

    let upper = stats.bounds_for("Flight Distance").unwrap().upper;
    let lower = stats.bounds_for("Departure Delay in Minutes").unwrap().lower;
    assert_eq!(column_f64_strict(&applied, "Flight Distance").unwrap(), vec![upper]);
    assert_eq!(column_f64_strict(&applied, "Departure Delay in Minutes").unwrap(), vec![lower]);
    assert_eq!(
        column_f64_strict(&applied, "Arrival Delay in Minutes").unwrap(),
        vec![stats.median_for("Arrival Delay in Minutes").unwrap()]
    );
}

#[test]
fn test_age_groups_follow_bin_edges() {
    let df = df!(
        "Departure Delay in Minutes" => [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        "Arrival Delay in Minutes" => [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        "Flight Distance" => [100.0, 100.0, 100.0, 100.0, 100.0, 100.0],
        "Age" => [10.0, 18.0, 25.0, 40.0, 70.0, 100.0]
    )
    .unwrap();
    let built = FeatureBuilder::default().build(&df).unwrap();
    let groups: Vec<String> = column_str(&built, "Age Group").unwrap().into_iter().flatten().collect();
    assert_eq!(groups, vec!["Child", "Child", "Youngster", "Adult", "Senior", "Senior"]);

    assert_eq!(AgeGroup::from_age(0.0).unwrap_err().kind(), ErrorKind::Domain);
    assert_eq!(AgeGroup::from_age(100.5).unwrap_err().kind(), ErrorKind::Domain);
}

#[test]
fn test_delay_features() {
    let df = df!(
        "Departure Delay in Minutes" => [10.0, 0.0],
        "Arrival Delay in Minutes" => [5.0, 0.0],
        "Flight Distance" => [100.0, 0.0],
        "Age" => [30.0, 30.0]
    )
    .unwrap();
    let built = FeatureBuilder::default().build(&df).unwrap();
    assert_eq!(column_f64_strict(&built, "Total Delay").unwrap(), vec![15.0, 0.0]);
    let ratio = column_f64_strict(&built, "Delay Ratio").unwrap();
    assert!((ratio[0] - 15.0 / 101.0).abs() < 1e-12);
    // Zero distance never divides by zero
    assert_eq!(ratio[1], 0.0);
}

#[test]
fn test_encoding_is_deterministic_and_invertible() {
    let (cleaned, _) = Cleaner::default().clean(&common::survey(90)).unwrap();
    let builder = FeatureBuilder::new(FeatureConfig::default());
    let built = builder.build(&cleaned).unwrap();

    let (a, mappings) = builder.encode(&built).unwrap();
    let (b, _) = builder.encode(&built).unwrap();
    assert!(a.equals(&b));

    let target = &mappings["satisfaction"];
    assert_eq!(target.classes(), &["neutral or dissatisfied", "satisfied"]);
    let codes = column_f64_strict(&a, "satisfaction").unwrap();
    let labels = column_str(&built, "satisfaction").unwrap();
    for (code, label) in codes.iter().zip(&labels) {
        assert_eq!(target.decode(*code as i64), label.as_deref());
    }

    // Reapplying the stored mappings reproduces the same codes
    let reapplied = LabelEncoder::apply(&built, &mappings).unwrap();
    assert!(reapplied.equals(&a));
}

#[test]
fn test_unseen_category_is_rejected() {
    let built = FeatureBuilder::default()
        .build(&Cleaner::default().clean(&common::survey(60)).unwrap().0)
        .unwrap();
    let (_, mappings) = FeatureBuilder::default().encode(&built).unwrap();

    let mut novel = built.head(Some(1));
    novel
        .with_column(Series::new("Class".into(), vec!["First"]))
        .unwrap();
    let err = LabelEncoder::apply(&novel, &mappings).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Domain);
}

#[test]
fn test_selection_keeps_k_features_and_target() {
    let (cleaned, _) = Cleaner::default().clean(&common::survey(240)).unwrap();
    let builder = FeatureBuilder::default();
    let (encoded, _) = builder.encode(&builder.build(&cleaned).unwrap()).unwrap();

    let (selected, ranking) = FeatureSelector::new(5).select(&encoded, "satisfaction").unwrap();
    let columns = column_names(&selected);
    assert_eq!(columns.len(), 6);
    assert_eq!(columns.last().map(String::as_str), Some("satisfaction"));
    assert_eq!(ranking.len(), encoded.width() - 1);

    // The kept features are the top of the ranking
    let top: Vec<&str> = ranking.top(5);
    for column in &columns[..5] {
        assert!(top.contains(&column.as_str()));
    }
    // Every selected feature scores at least as high as every dropped one
    let min_kept = columns[..5]
        .iter()
        .map(|c| ranking.score(c).unwrap())
        .fold(f64::INFINITY, f64::min);
    for (name, score) in ranking.entries() {
        if !columns.contains(name) {
            assert!(*score <= min_kept);
        }
    }
}

#[test]
fn test_selection_requires_enough_candidates() {
    let df = df!("a" => [1.0, 2.0, 3.0, 4.0, 5.0], "satisfaction" => [0i64, 1, 0, 1, 0]).unwrap();
    let err = FeatureSelector::new(3).select(&df, "satisfaction").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFeatures);
}
