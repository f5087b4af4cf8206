//! Baseline behavior of the job pool: completeness, dispatch order,
//! configuration validation, and the end-to-end fit pipeline.

mod common;

use common::{ClassifyPayload, Echo, RecordingProgress, SlowEcho};
use fastloop::fit::{FitOutcome, PhotonHistogramFit, PixelPayload};
use fastloop::{InputTable, JobPool, OutputTable, PoolConfig, PoolSize, Record, SilentProgress};

use anyhow::Result;
use std::time::Duration;

// ============================================================================
// 1. Completeness and the echo scenario
// ============================================================================

#[test]
fn test_five_jobs_two_workers_echo_scenario() -> Result<()> {
    let input = InputTable::new(vec![10.0, 11.0, 12.0, 13.0, 14.0]);
    let mut output = OutputTable::new(input.len(), ["value"]);

    let config = PoolConfig::builder().pool_size(PoolSize::Fixed(2)).build();
    let pool = JobPool::<f64, f64>::spawn(&config, input.len(), Echo)?;
    let pool_size = pool.pool_size();

    let summary = pool.run(
        |index| input.get(index),
        |index, value| output.put(index, &Record::from_single("value", value), "ok"),
        SilentProgress,
    )?;

    assert!(output.is_complete());
    for index in 0..5 {
        assert_eq!(output.column("value")?[index], 10.0 + index as f64);
        assert_eq!(output.status(index), Some("ok"));
    }

    assert_eq!(summary.total_jobs, 5);
    assert_eq!(summary.pool_size, pool_size);
    assert!(summary.jobs_per_sec() > 0.0);
    Ok(())
}

#[test]
fn test_every_index_written_exactly_once() -> Result<()> {
    let total = 100;
    let mut written: Vec<Option<f64>> = vec![None; total];

    let config = PoolConfig::builder().pool_size(PoolSize::Fixed(4)).build();
    let pool = JobPool::spawn(
        &config,
        total,
        SlowEcho {
            delay: Duration::from_millis(1),
        },
    )?;

    pool.run(
        |index| Ok(index as f64 * 2.0),
        |index, value| {
            assert!(written[index].is_none(), "index {index} written twice");
            written[index] = Some(value);
            Ok(())
        },
        SilentProgress,
    )?;

    for (index, value) in written.iter().enumerate() {
        assert_eq!(*value, Some(index as f64 * 2.0), "index {index}");
    }
    Ok(())
}

#[test]
fn test_dispatch_order_strictly_increasing() -> Result<()> {
    let total = 50;
    let mut produced = Vec::new();

    let config = PoolConfig::builder().pool_size(PoolSize::Fixed(4)).build();
    let pool = JobPool::<usize, usize>::spawn(&config, total, Echo)?;

    pool.run(
        |index| {
            produced.push(index);
            Ok(index)
        },
        |_index, _value| Ok(()),
        SilentProgress,
    )?;

    let expected: Vec<usize> = (0..total).collect();
    assert_eq!(produced, expected, "payloads must be produced in index order");
    Ok(())
}

// ============================================================================
// 2. Configuration validation and clamping
// ============================================================================

#[test]
fn test_pool_size_clamped_to_available_units() -> Result<()> {
    let available = num_cpus::get();

    let config = PoolConfig::builder()
        .pool_size(PoolSize::Fixed(100))
        .build();
    let pool = JobPool::<usize, usize>::spawn(&config, 8, Echo)?;
    assert_eq!(pool.pool_size(), available.min(100));
    drop(pool);

    let config = PoolConfig::builder().pool_size(PoolSize::Available).build();
    let pool = JobPool::<usize, usize>::spawn(&config, 8, Echo)?;
    assert_eq!(pool.pool_size(), available);
    Ok(())
}

#[test]
fn test_empty_batch_rejected() {
    let config = PoolConfig::default();
    assert!(JobPool::<usize, usize>::spawn(&config, 0, Echo).is_err());
}

#[test]
fn test_zero_workers_rejected() {
    let config = PoolConfig::builder().pool_size(PoolSize::Fixed(0)).build();
    assert!(JobPool::<usize, usize>::spawn(&config, 10, Echo).is_err());
}

// ============================================================================
// 3. Progress reporting cadence
// ============================================================================

#[test]
fn test_progress_reports_every_completion_on_small_batches() -> Result<()> {
    let mut progress = RecordingProgress::default();

    let config = PoolConfig::builder().pool_size(PoolSize::Fixed(2)).build();
    let pool = JobPool::<usize, usize>::spawn(&config, 10, Echo)?;
    pool.run(
        |index| Ok(index),
        |_index, _value| Ok(()),
        &mut progress,
    )?;

    assert_eq!(progress.fractions.len(), 10);
    assert!(progress.fractions.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*progress.fractions.last().unwrap(), 1.0);
    assert!(progress.messages.iter().all(|m| !m.is_empty()));
    Ok(())
}

#[test]
fn test_progress_interval_override() -> Result<()> {
    let mut progress = RecordingProgress::default();

    let config = PoolConfig::builder()
        .pool_size(PoolSize::Fixed(2))
        .progress_interval(5)
        .build();
    let pool = JobPool::<usize, usize>::spawn(&config, 10, Echo)?;
    pool.run(
        |index| Ok(index),
        |_index, _value| Ok(()),
        &mut progress,
    )?;

    assert_eq!(progress.fractions, vec![0.5, 1.0]);
    Ok(())
}

// ============================================================================
// 4. Per-item failures stay per-item
// ============================================================================

#[test]
fn test_invalid_payload_yields_stored_failure_status() -> Result<()> {
    let input = InputTable::new(vec![Some(1.0), None, Some(3.0)]);
    let mut output = OutputTable::new(input.len(), ["value"]);

    let config = PoolConfig::builder().pool_size(PoolSize::Fixed(2)).build();
    let pool = JobPool::spawn(&config, input.len(), ClassifyPayload)?;

    pool.run(
        |index| input.get(index),
        |index, (value, status)| output.put(index, &Record::from_single("value", value), status),
        SilentProgress,
    )?;

    assert!(output.is_complete(), "a failed item must still be stored");
    assert_eq!(output.status(0), Some("ok"));
    assert_eq!(output.status(1), Some("invalid_input"));
    assert!(output.column("value")?[1].is_nan());
    assert_eq!(output.status(2), Some("ok"));
    Ok(())
}

// ============================================================================
// 5. End-to-end fit pipeline
// ============================================================================

#[test]
fn test_fit_pipeline_end_to_end() -> Result<()> {
    let bins: Vec<f64> = (0..121).map(|i| i as f64).collect();
    let shape = |x: f64| {
        1000.0 * (-0.5 * ((x - 3.0) / 3.0).powi(2)).exp()
            + 50.0 * (-0.5 * ((x - 30.0) / 4.0).powi(2)).exp()
    };
    let good_pixel = PixelPayload {
        histogram: bins.iter().map(|&x| shape(x)).collect(),
        masked: false,
    };
    let masked_pixel = PixelPayload {
        histogram: good_pixel.histogram.clone(),
        masked: true,
    };
    let dead_pixel = PixelPayload {
        histogram: vec![0.0; bins.len()],
        masked: false,
    };

    let input = InputTable::new(vec![good_pixel, masked_pixel, dead_pixel]);
    let mut output = OutputTable::new(
        input.len(),
        [
            "bg_amp",
            "bg_offset",
            "bg_sigma",
            "photon_amp",
            "photon_offset",
            "photon_sigma",
        ],
    );

    let config = PoolConfig::builder().pool_size(PoolSize::Fixed(2)).build();
    let pool = JobPool::spawn(&config, input.len(), PhotonHistogramFit::new(bins))?;
    pool.run(
        |index| input.get(index),
        |index, outcome: FitOutcome| {
            let status = outcome.status;
            output.put(index, &outcome.into_record(), status.as_str())
        },
        SilentProgress,
    )?;

    assert!(output.is_complete());
    assert_eq!(output.status(0), Some("ok"));
    assert!((output.column("bg_offset")?[0] - 3.0).abs() < 0.1);
    assert!((output.column("photon_offset")?[0] - 30.0).abs() < 0.5);

    assert_eq!(output.status(1), Some("masked"));
    assert!(output.column("bg_amp")?[1].is_nan());

    // A flat histogram cannot constrain the background stage.
    assert_eq!(output.status(2), Some("hist_error"));

    let mut exported = Vec::new();
    output.write_json(&mut exported)?;
    assert!(!exported.is_empty());
    Ok(())
}
