//! src/fit/mod.rs
//!
//! Two-stage photon histogram fit.
//!
//! Each detector pixel accumulates a histogram of ADU values. The zero-
//! photon (background) peak dominates; the one-photon peak sits above
//! it, separated by a valley. Stage one fits a Gaussian to the
//! background peak; stage two locates the valley, then fits a Gaussian
//! to the one-photon peak above it.
//!
//! The fit is the canonical per-item computation for a pool run: it
//! implements [`Computation`] over `PixelPayload` rows, catches every
//! failure itself, and encodes what happened in a closed set of
//! [`FitStatus`] tags so that no input, however malformed, can take a
//! worker down.

pub mod gaussian;

pub use gaussian::{fit_gaussian, FitFailure, Gaussian};

use crate::compute::Computation;
use crate::record::Record;
use serde::Serialize;

/// Input for one pixel: its histogram row and the detector mask flag.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelPayload {
    pub histogram: Vec<f64>,
    pub masked: bool,
}

/// Outcome tag for one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    /// Both stages produced parameters.
    Ok,
    /// The pixel is masked out; nothing was fitted.
    Masked,
    /// A least-squares stage ran but failed to converge.
    FitError,
    /// The histogram violates the shape assumptions of the fit:
    /// degenerate or non-finite input, a first bin above the fitted
    /// background amplitude, or no usable valley/peak region.
    HistError,
}

impl FitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitStatus::Ok => "ok",
            FitStatus::Masked => "masked",
            FitStatus::FitError => "fit_error",
            FitStatus::HistError => "hist_error",
        }
    }
}

/// Result of fitting one pixel.
///
/// Stage results are kept even when a later stage fails, so a pixel
/// whose photon peak cannot be fitted still reports its background.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitOutcome {
    pub status: FitStatus,
    pub background: Option<Gaussian>,
    pub photon: Option<Gaussian>,
}

impl FitOutcome {
    fn with_status(status: FitStatus) -> Self {
        Self {
            status,
            background: None,
            photon: None,
        }
    }

    /// The six canonical output fields, NaN where a stage has no
    /// result.
    pub fn into_record(self) -> Record {
        let (bg_amp, bg_offset, bg_sigma) = unpack(self.background);
        let (photon_amp, photon_offset, photon_sigma) = unpack(self.photon);
        Record::from_single("bg_amp", bg_amp)
            .with_field("bg_offset", bg_offset)
            .with_field("bg_sigma", bg_sigma)
            .with_field("photon_amp", photon_amp)
            .with_field("photon_offset", photon_offset)
            .with_field("photon_sigma", photon_sigma)
    }
}

fn unpack(params: Option<Gaussian>) -> (f64, f64, f64) {
    match params {
        Some(g) => (g.amp, g.mean, g.sigma),
        None => (f64::NAN, f64::NAN, f64::NAN),
    }
}

/// Starting sigma for the background stage, in bins.
const BG_SIGMA_START: f64 = 3.5;
/// The background/photon threshold sits this many background sigmas
/// above the background mean.
const THRESHOLD_SIGMAS: f64 = 4.5;
/// Half-width of the window searched for the valley floor, in bins.
const VALLEY_HALF_WIDTH: usize = 5;

/// The two-stage fit, configured with the shared histogram bin axis.
///
/// The bin axis is the static argument every job shares; each worker
/// holds the same `PhotonHistogramFit` through an `Arc`, so it is built
/// once per run, not once per job.
#[derive(Debug, Clone)]
pub struct PhotonHistogramFit {
    bins: Vec<f64>,
}

impl PhotonHistogramFit {
    pub fn new(bins: Vec<f64>) -> Self {
        Self { bins }
    }

    pub fn bins(&self) -> &[f64] {
        &self.bins
    }

    fn fit_pixel(&self, histogram: &[f64]) -> FitOutcome {
        let bins = &self.bins;
        if histogram.len() != bins.len() || histogram.len() < 2 * VALLEY_HALF_WIDTH + 3 {
            return FitOutcome::with_status(FitStatus::HistError);
        }

        // Stage 1: the background peak, located by arg-max over the
        // interior bins.
        let bg_peak = 1 + argmax(&histogram[1..histogram.len() - 1]);
        let init = Gaussian {
            amp: histogram[bg_peak],
            mean: bins[bg_peak] + 1e-3,
            sigma: BG_SIGMA_START,
        };
        // Fit only the bins left of the photon peaks, skipping bin 0.
        let bg_hi = (bg_peak + (4.0 * BG_SIGMA_START) as usize).min(bins.len());
        let background = match fit_gaussian(&bins[1..bg_hi], &histogram[1..bg_hi], init) {
            Ok(params) => params,
            Err(FitFailure::DidNotConverge) => {
                return FitOutcome::with_status(FitStatus::FitError)
            }
            Err(FitFailure::Degenerate) => return FitOutcome::with_status(FitStatus::HistError),
        };

        // An underflow pile-up in the first bin means the histogram
        // shape cannot be trusted.
        if histogram[0] >= background.amp {
            return FitOutcome {
                status: FitStatus::HistError,
                background: Some(background),
                photon: None,
            };
        }

        // The valley between the background and one-photon peaks:
        // start from the expected threshold position, refine to the
        // last minimum within the window.
        let target = background.mean + THRESHOLD_SIGMAS * background.sigma.abs();
        let guess = nearest_bin(bins, target);
        let windowed = guess
            .checked_sub(VALLEY_HALF_WIDTH)
            .map(|lo| (lo, guess + VALLEY_HALF_WIDTH));
        let Some((valley_lo, valley_hi)) = windowed.filter(|&(_, hi)| hi < histogram.len()) else {
            return FitOutcome {
                status: FitStatus::HistError,
                background: Some(background),
                photon: None,
            };
        };
        let valley = &histogram[valley_lo..valley_hi];
        let floor = valley.iter().copied().fold(f64::INFINITY, f64::min);
        let Some(offset) = valley.iter().rposition(|&v| v == floor) else {
            return FitOutcome {
                status: FitStatus::HistError,
                background: Some(background),
                photon: None,
            };
        };
        let threshold = valley_lo + offset;

        // Stage 2: the one-photon peak above the valley.
        let peak = threshold + argmax(&histogram[threshold..histogram.len() - 1]);
        let init = Gaussian {
            amp: histogram[peak],
            mean: bins[peak],
            sigma: background.sigma,
        };
        // Fit strictly above the midpoint between valley and peak,
        // excluding the overflow bin at the end.
        let cut = (peak + threshold + 2) / 2;
        let hi = bins.len() - 1;
        let photon = match fit_gaussian(&bins[cut..hi], &histogram[cut..hi], init) {
            Ok(params) => params,
            Err(FitFailure::DidNotConverge) => {
                return FitOutcome {
                    status: FitStatus::FitError,
                    background: Some(background),
                    photon: None,
                }
            }
            Err(FitFailure::Degenerate) => {
                return FitOutcome {
                    status: FitStatus::HistError,
                    background: Some(background),
                    photon: None,
                }
            }
        };

        FitOutcome {
            status: FitStatus::Ok,
            background: Some(background),
            photon: Some(photon),
        }
    }
}

impl Computation<PixelPayload, FitOutcome> for PhotonHistogramFit {
    fn run(&self, _index: usize, payload: PixelPayload) -> FitOutcome {
        if payload.masked {
            return FitOutcome::with_status(FitStatus::Masked);
        }
        self.fit_pixel(&payload.histogram)
    }
}

/// Index of the first maximum, ignoring NaN.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] || values[best].is_nan() {
            best = i;
        }
    }
    best
}

/// Index of the bin closest to `target`.
fn nearest_bin(bins: &[f64], target: f64) -> usize {
    let mut best = 0;
    for (i, &b) in bins.iter().enumerate() {
        if (b - target).abs() < (bins[best] - target).abs() {
            best = i;
        }
    }
    best
}
