//! Time-domain and frequency-domain signal containers

use serde::{Deserialize, Serialize};

/// Uniformly sampled voltage series.
///
/// `time[i] = i / sampling_rate`, so times are strictly increasing and the
/// two vectors always have the same length. Fault transforms never mutate a
/// waveform in place; they return a new one sharing the same time base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    /// Sampling rate (Hz)
    pub sampling_rate: f64,
    /// Sample times (s)
    pub time: Vec<f64>,
    /// Instantaneous voltage (V)
    pub voltage: Vec<f64>,
}

impl Waveform {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.voltage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltage.is_empty()
    }

    /// Copy of this waveform with a new voltage series on the same time base.
    pub fn with_voltage(&self, voltage: Vec<f64>) -> Self {
        debug_assert_eq!(voltage.len(), self.time.len());
        Self {
            sampling_rate: self.sampling_rate,
            time: self.time.clone(),
            voltage,
        }
    }

    /// Iterate `(time, voltage)` pairs.
    pub fn samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.time.iter().copied().zip(self.voltage.iter().copied())
    }
}

/// One-sided magnitude spectrum.
///
/// One entry per non-negative DFT bin in ascending frequency order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    /// Bin frequencies (Hz)
    pub frequencies: Vec<f64>,
    /// Bin magnitudes, `(2/N)·|X_k|` (V)
    pub magnitudes: Vec<f64>,
    /// Sampling rate the spectrum was computed at (Hz)
    pub sampling_rate: f64,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    /// Frequency spacing between adjacent bins (Hz).
    pub fn bin_width(&self) -> f64 {
        match self.frequencies.as_slice() {
            [first, second, ..] => second - first,
            _ => self.sampling_rate,
        }
    }

    /// Index of the bin whose frequency is closest to `target_hz`.
    ///
    /// Ties resolve to the lowest index.
    pub fn nearest_bin(&self, target_hz: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &f) in self.frequencies.iter().enumerate() {
            let dist = (f - target_hz).abs();
            match best {
                Some((_, best_dist)) if dist >= best_dist => {}
                _ => best = Some((i, dist)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// `(frequency, magnitude)` of the largest bin.
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.frequencies
            .iter()
            .zip(self.magnitudes.iter())
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(&f, &m)| (f, m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(frequencies: Vec<f64>) -> Spectrum {
        let magnitudes = vec![0.0; frequencies.len()];
        Spectrum {
            frequencies,
            magnitudes,
            sampling_rate: 10.0,
        }
    }

    #[test]
    fn test_nearest_bin_prefers_lowest_index_on_tie() {
        let s = spectrum(vec![0.0, 1.0, 2.0, 3.0]);
        // 1.5 is equidistant from bins 1 and 2
        assert_eq!(s.nearest_bin(1.5), Some(1));
        assert_eq!(s.nearest_bin(2.9), Some(3));
        assert_eq!(s.nearest_bin(-4.0), Some(0));
    }

    #[test]
    fn test_nearest_bin_empty() {
        assert_eq!(spectrum(Vec::new()).nearest_bin(50.0), None);
    }

    #[test]
    fn test_bin_width() {
        assert!((spectrum(vec![0.0, 0.5, 1.0]).bin_width() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_with_voltage_keeps_time_base() {
        let w = Waveform {
            sampling_rate: 4.0,
            time: vec![0.0, 0.25, 0.5, 0.75],
            voltage: vec![1.0, 2.0, 3.0, 4.0],
        };
        let doubled = w.with_voltage(w.voltage.iter().map(|v| v * 2.0).collect());
        assert_eq!(doubled.time, w.time);
        assert_eq!(doubled.voltage, vec![2.0, 4.0, 6.0, 8.0]);
        assert_eq!(w.voltage, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(w.samples().nth(2), Some((0.5, 3.0)));
    }
}
