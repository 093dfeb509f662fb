//! Pause segmentation over a loudness contour.
//!
//! A frame is silent when it sits below the absolute floor or at/below a
//! signal-adaptive floor computed once for the whole series:
//! `mean(rolling_mean) - k * mean(rolling_std)`. Runs of silent frames are
//! then cut at their rising and falling edges and kept when long enough.

use crate::config::{OpenRunPolicy, PauseConfig};
use crate::frames::FrameSeries;
use crate::util::RingBuffer;
use serde::{Deserialize, Serialize};

/// One detected pause. Frame indices are half-open: `[start_frame, end_frame)`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct PauseSegment {
    pub start_frame: usize,
    pub end_frame: usize,
    pub duration: f64,
}

/// Aggregate view over a list of pause durations.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PauseSummary {
    pub count: usize,
    pub mean_s: f64,
    pub total_s: f64,
    pub longest_s: f64,
}

impl PauseSummary {
    pub fn from_durations(durations: &[f64]) -> Self {
        if durations.is_empty() {
            return Self::default();
        }
        let total_s: f64 = durations.iter().sum();
        Self {
            count: durations.len(),
            mean_s: total_s / durations.len() as f64,
            total_s,
            longest_s: durations.iter().copied().fold(0.0, f64::max),
        }
    }
}

/// Pause durations in seconds, in chronological order.
pub fn detect_pauses(series: &FrameSeries, config: &PauseConfig) -> Vec<f64> {
    detect_pause_segments(series, config)
        .into_iter()
        .map(|p| p.duration)
        .collect()
}

pub fn detect_pause_segments(series: &FrameSeries, config: &PauseConfig) -> Vec<PauseSegment> {
    let values = series.values();
    if values.is_empty() || values.len() < config.hysteresis_frames {
        return Vec::new();
    }

    let relative = relative_floor(
        values,
        config.rolling_window_frames,
        config.relative_std_multiplier,
    );
    let mut mask = silence_mask(values, config.absolute_floor, relative);
    apply_hysteresis(&mut mask, config.hysteresis_frames);

    let segments: Vec<PauseSegment> = silent_runs(&mask, config.open_runs)
        .into_iter()
        .map(|(start_frame, end_frame)| PauseSegment {
            start_frame,
            end_frame,
            duration: series.frames_to_secs(end_frame - start_frame),
        })
        .filter(|p| p.duration >= config.min_pause_s)
        .collect();

    tracing::debug!(
        frames = values.len(),
        relative_floor = ?relative,
        silent_frames = mask.iter().filter(|&&s| s).count(),
        pauses = segments.len(),
        "pause segmentation done"
    );
    segments
}

/// Adaptive floor from complete rolling windows only; `None` when no window
/// completes or the window is too short for a standard deviation.
pub(crate) fn relative_floor(values: &[f64], window: usize, std_multiplier: f64) -> Option<f64> {
    let mut ring = RingBuffer::new(window.max(1));
    let mut mean_sum = 0.0;
    let mut std_sum = 0.0;
    let mut windows = 0usize;

    for &v in values {
        ring.push(v);
        if !ring.is_full() {
            continue;
        }
        let (Some(mean), Some(std)) = (ring.mean(), ring.sample_std()) else {
            continue;
        };
        mean_sum += mean;
        std_sum += std;
        windows += 1;
    }

    if windows == 0 {
        return None;
    }
    let n = windows as f64;
    Some(mean_sum / n - std_multiplier * (std_sum / n))
}

fn silence_mask(values: &[f64], absolute_floor: f64, relative_floor: Option<f64>) -> Vec<bool> {
    values
        .iter()
        .map(|&v| v < absolute_floor || relative_floor.is_some_and(|floor| v <= floor))
        .collect()
}

/// Forward scan: every window of `width` frames that is entirely silent is
/// forced silent as a block.
fn apply_hysteresis(mask: &mut [bool], width: usize) {
    if width == 0 || mask.len() < width {
        return;
    }
    for i in 0..=mask.len() - width {
        if mask[i..i + width].iter().all(|&s| s) {
            mask[i..i + width].iter_mut().for_each(|s| *s = true);
        }
    }
}

/// Half-open silent runs found by edge detection on the mask.
fn silent_runs(mask: &[bool], policy: OpenRunPolicy) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut open: Option<usize> = match (mask.first(), policy) {
        (Some(true), OpenRunPolicy::Close) => Some(0),
        _ => None,
    };

    for i in 1..mask.len() {
        match (mask[i - 1], mask[i]) {
            (false, true) => open = Some(i),
            (true, false) => {
                if let Some(start) = open.take() {
                    runs.push((start, i));
                }
            }
            _ => {}
        }
    }

    if let (Some(start), OpenRunPolicy::Close) = (open, policy) {
        runs.push((start, mask.len()));
    }
    runs
}
