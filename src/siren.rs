//! Siren classifier.
//!
//! The "frequency" is a coarse estimate: the index of the loudest sample in a
//! scan mapped linearly onto 0..4000 Hz. Thresholds and calibration are tuned
//! against this estimator, so it is not a spectral analysis and must not be
//! replaced by one.

use crate::peripheral::AudioSampler;
use serde::Serialize;
use tracing::{debug, info};

pub const ESTIMATOR_MAX_FREQUENCY_HZ: f32 = 4000.0;
pub const HYSTERESIS_CAP: u8 = 5;
pub const NOISE_FLOOR_MARGIN: f32 = 1.1;

#[derive(Debug, Clone, PartialEq)]
pub struct SirenSettings {
    pub sample_count: usize,
    pub band_low_hz: f32,
    pub band_high_hz: f32,
    pub min_strength: f32,
    pub calibration_scans: usize,
}

impl Default for SirenSettings {
    fn default() -> Self {
        Self {
            sample_count: 128,
            band_low_hz: 300.0,
            band_high_hz: 1800.0,
            min_strength: 50.0,
            calibration_scans: 30,
        }
    }
}

/// Loudest sample of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Peak {
    pub frequency_hz: f32,
    pub magnitude: f32,
}

/// Outcome of one classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SirenReading {
    pub present: bool,
    pub hysteresis_count: u8,
    /// True only on the classification that lifted the count to the cap.
    pub confidence_reached: bool,
}

/// Find the loudest sample and map its index onto the estimator range.
pub fn estimate_peak(scan: &[f32]) -> Peak {
    let Some((index, magnitude)) = scan
        .iter()
        .map(|sample| sample.abs())
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (index, magnitude)| match best {
            Some((_, best_magnitude)) if best_magnitude >= magnitude => best,
            _ => Some((index, magnitude)),
        })
    else {
        return Peak::default();
    };

    Peak {
        frequency_hz: index as f32 * ESTIMATOR_MAX_FREQUENCY_HZ / scan.len() as f32,
        magnitude,
    }
}

#[derive(Debug, Clone)]
pub struct SirenClassifier {
    settings: SirenSettings,
    noise_floor: Option<f32>,
    peak: Peak,
    hysteresis_count: u8,
}

impl SirenClassifier {
    pub fn new(settings: SirenSettings) -> Self {
        Self {
            settings,
            noise_floor: None,
            peak: Peak::default(),
            hysteresis_count: 0,
        }
    }

    pub fn settings(&self) -> &SirenSettings {
        &self.settings
    }

    /// Sample quiet ambient sound and fix the noise floor. Runs at most once.
    pub fn calibrate<S>(&mut self, sampler: &mut S) -> f32
    where
        S: AudioSampler + ?Sized,
    {
        if let Some(floor) = self.noise_floor {
            debug!(noise_floor = floor, "Siren classifier already calibrated");
            return floor;
        }

        let loudest = (0..self.settings.calibration_scans)
            .map(|_| estimate_peak(&sampler.sample_scan()).magnitude)
            .fold(0.0_f32, f32::max);
        let floor = loudest * NOISE_FLOOR_MARGIN;
        self.noise_floor = Some(floor);
        info!(
            scans = self.settings.calibration_scans,
            max_magnitude = loudest,
            noise_floor = floor,
            "Siren noise floor calibrated"
        );
        floor
    }

    pub fn is_calibrated(&self) -> bool {
        self.noise_floor.is_some()
    }

    pub fn noise_floor(&self) -> f32 {
        self.noise_floor.unwrap_or(0.0)
    }

    /// Classify one scan and step the hysteresis counter.
    pub fn classify(&mut self, scan: &[f32]) -> SirenReading {
        self.peak = estimate_peak(scan);
        let in_band = self.peak.frequency_hz > self.settings.band_low_hz
            && self.peak.frequency_hz < self.settings.band_high_hz;
        let loud_enough = self.peak.magnitude > self.noise_floor() + self.settings.min_strength;
        // Frequencies are only meaningful on the configured scan length.
        let complete = scan.len() == self.settings.sample_count;
        if !complete && !scan.is_empty() {
            debug!(
                samples = scan.len(),
                expected = self.settings.sample_count,
                "Partial audio scan ignored"
            );
        }
        let present = complete && in_band && loud_enough;

        let previous = self.hysteresis_count;
        self.hysteresis_count = if present {
            (previous + 1).min(HYSTERESIS_CAP)
        } else {
            previous.saturating_sub(1)
        };

        let confidence_reached =
            previous < HYSTERESIS_CAP && self.hysteresis_count == HYSTERESIS_CAP;
        if present {
            debug!(
                frequency_hz = self.peak.frequency_hz,
                magnitude = self.peak.magnitude,
                hysteresis = self.hysteresis_count,
                "Siren-like peak detected"
            );
        }

        SirenReading {
            present,
            hysteresis_count: self.hysteresis_count,
            confidence_reached,
        }
    }

    pub fn reset_hysteresis(&mut self) {
        self.hysteresis_count = 0;
    }

    pub fn hysteresis_count(&self) -> u8 {
        self.hysteresis_count
    }

    pub fn peak(&self) -> Peak {
        self.peak
    }
}

impl Default for SirenClassifier {
    fn default() -> Self {
        Self::new(SirenSettings::default())
    }
}
