//! One-cycle meter pipeline and the "train now" trigger

use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};

use super::PipelineError;
use crate::anomaly::{detector_from_config, AnomalyClassifier};
use crate::config::{LiveConfig, MeterConfig, SignalConfig};
use crate::diagnosis::{Diagnoser, Diagnosis};
use crate::processing::{extract_features_with_spectrum, SpectralAnalyzer};
use crate::simulation::{FaultInjector, WaveformGenerator};
use crate::types::{CycleReport, CycleRequest, FeatureVector, Spectrum, Waveform};

/// Wires generator, injector, analyzer and diagnoser for one meter.
///
/// Built once from a `MeterConfig`; `run_cycle` borrows `&self`, so a single
/// pipeline can serve any number of sequential or concurrent cycles.
#[derive(Debug)]
pub struct MeterPipeline {
    signal: SignalConfig,
    live: LiveConfig,
    training_samples: usize,
    training_noise_level: f64,
    generator: WaveformGenerator,
    injector: FaultInjector,
    analyzer: SpectralAnalyzer,
    diagnoser: Diagnoser,
}

impl MeterPipeline {
    /// Pipeline with the detector selected by `config.anomaly`.
    pub fn from_config(config: &MeterConfig) -> Result<Self, PipelineError> {
        Self::with_classifier(config, detector_from_config(&config.anomaly))
    }

    /// Pipeline with an explicit anomaly classifier.
    pub fn with_classifier(
        config: &MeterConfig,
        classifier: Arc<dyn AnomalyClassifier>,
    ) -> Result<Self, PipelineError> {
        let generator = WaveformGenerator::from_config(&config.signal)?;
        let injector = FaultInjector::from_config(&config.signal)?;
        let analyzer = SpectralAnalyzer::new(config.signal.sample_count(), config.signal.sampling_rate_hz)?;

        info!(
            sampling_rate_hz = config.signal.sampling_rate_hz,
            samples = analyzer.size(),
            resolution_hz = analyzer.frequency_resolution(),
            "Meter pipeline ready"
        );

        Ok(Self {
            signal: config.signal.clone(),
            live: config.live.clone(),
            training_samples: config.anomaly.training_samples,
            training_noise_level: config.anomaly.training_noise_level,
            generator,
            injector,
            analyzer,
            diagnoser: Diagnoser::new(config.thresholds, classifier),
        })
    }

    pub fn signal(&self) -> &SignalConfig {
        &self.signal
    }

    pub fn live_config(&self) -> &LiveConfig {
        &self.live
    }

    pub fn diagnoser(&self) -> &Diagnoser {
        &self.diagnoser
    }

    pub fn classifier(&self) -> &Arc<dyn AnomalyClassifier> {
        self.diagnoser.classifier()
    }

    /// Generate, fault and noise one waveform for `request`.
    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        request: &CycleRequest,
        rng: &mut R,
    ) -> Result<Waveform, PipelineError> {
        let clean = self.generator.generate(request.frequency_hz)?;
        let faulted = self.injector.apply(&clean, &request.fault)?;
        Ok(self.injector.noise(&faulted, request.noise_level, rng)?)
    }

    /// Spectrum and features of a waveform, THD taken against `fundamental_hz`.
    pub fn analyze(
        &self,
        waveform: &Waveform,
        fundamental_hz: f64,
    ) -> Result<(Spectrum, FeatureVector), PipelineError> {
        let spectrum = self.analyzer.analyze(waveform)?;
        let features = extract_features_with_spectrum(waveform, &spectrum, fundamental_hz)?;
        Ok((spectrum, features))
    }

    /// Diagnose an already extracted feature vector.
    pub fn diagnose(&self, features: &FeatureVector) -> Diagnosis {
        self.diagnoser.diagnose(features.rms, features.thd)
    }

    /// Run one full analysis cycle.
    pub fn run_cycle<R: Rng + ?Sized>(
        &self,
        request: &CycleRequest,
        rng: &mut R,
    ) -> Result<CycleReport, PipelineError> {
        let waveform = self.synthesize(request, rng)?;
        let (spectrum, features) = self.analyze(&waveform, request.frequency_hz)?;
        let diagnosis = self.diagnose(&features);

        debug!(
            fault = request.fault.label(),
            frequency_hz = request.frequency_hz,
            noise_level = request.noise_level,
            rms = features.rms,
            thd = features.thd,
            "Cycle complete"
        );

        Ok(CycleReport {
            timestamp: chrono::Utc::now(),
            fault: request.fault.label().to_string(),
            time: waveform.time,
            voltage: waveform.voltage,
            frequencies: spectrum.frequencies,
            magnitudes: spectrum.magnitudes,
            rms: features.rms,
            thd: features.thd,
            peak: features.peak.unwrap_or_default(),
            status: diagnosis.status(),
            issues: diagnosis.messages(),
        })
    }

    /// `n` nominal waveforms with training noise, as `[rms, thd]` tuples.
    pub fn build_training_set<R: Rng + ?Sized>(
        &self,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<Vec<f64>>, PipelineError> {
        let request = CycleRequest {
            frequency_hz: self.signal.fundamental_hz,
            noise_level: self.training_noise_level,
            ..CycleRequest::default()
        };
        (0..n)
            .map(|_| -> Result<Vec<f64>, PipelineError> {
                let waveform = self.synthesize(&request, &mut *rng)?;
                let (_, features) = self.analyze(&waveform, request.frequency_hz)?;
                Ok(features.model_input())
            })
            .collect()
    }

    /// Build the configured training set and train the classifier on it.
    ///
    /// Returns the number of samples trained on.
    pub fn train_anomaly_model<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<usize, PipelineError> {
        self.train_with_samples(self.training_samples, rng)
    }

    pub fn train_with_samples<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<usize, PipelineError> {
        let samples = self.build_training_set(n, rng)?;
        self.classifier().train(&samples)?;
        info!(samples = samples.len(), "Anomaly model retrained from nominal cycles");
        Ok(samples.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{AnomalyDetector, FitParams, IsolationForest};
    use crate::types::FaultSpec;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pipeline(dir: &tempfile::TempDir) -> MeterPipeline {
        let detector = AnomalyDetector::<IsolationForest>::new(dir.path().join("model.json"), FitParams::default());
        MeterPipeline::with_classifier(&MeterConfig::default(), Arc::new(detector)).expect("pipeline")
    }

    #[test]
    fn test_clean_cycle_without_model_is_normal() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let p = pipeline(&dir);
        let mut rng = StdRng::seed_from_u64(42);
        let report = p.run_cycle(&CycleRequest::default(), &mut rng).expect("cycle");
        assert_eq!(report.status, "Normal Operation");
        assert!(report.is_normal());
        assert!((report.rms - 230.0).abs() < 2.0, "rms {}", report.rms);
        assert!(report.thd < 0.05);
        assert_eq!(report.time.len(), 1000);
        assert_eq!(report.frequencies.len(), 501);
        assert_eq!(report.frequencies.len(), report.magnitudes.len());
    }

    #[test]
    fn test_sag_cycle_reports_sag() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let p = pipeline(&dir);
        let mut rng = StdRng::seed_from_u64(1);
        let request = CycleRequest {
            fault: FaultSpec::sag(0.5),
            ..CycleRequest::default()
        };
        let report = p.run_cycle(&request, &mut rng).expect("cycle");
        assert!(report.status.contains("Sag"), "status {}", report.status);
        assert_eq!(report.fault, "sag");
    }

    #[test]
    fn test_invalid_request_propagates() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let p = pipeline(&dir);
        let mut rng = StdRng::seed_from_u64(1);
        let request = CycleRequest {
            noise_level: -1.0,
            ..CycleRequest::default()
        };
        assert!(matches!(
            p.run_cycle(&request, &mut rng),
            Err(PipelineError::Simulation(_))
        ));
    }

    #[test]
    fn test_training_set_shape() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let p = pipeline(&dir);
        let mut rng = StdRng::seed_from_u64(3);
        let set = p.build_training_set(10, &mut rng).expect("set");
        assert_eq!(set.len(), 10);
        assert!(set.iter().all(|row| row.len() == FeatureVector::MODEL_ARITY));
        assert!(set.iter().all(|row| (row[0] - 230.0).abs() < 2.0 && row[1] < 0.05));
    }

    #[test]
    fn test_train_then_detect_gross_fault() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let p = pipeline(&dir);
        let mut rng = StdRng::seed_from_u64(42);
        assert_eq!(p.train_anomaly_model(&mut rng).expect("train"), 100);
        assert!(p.classifier().is_trained());

        let request = CycleRequest {
            fault: FaultSpec::sag(0.5),
            ..CycleRequest::default()
        };
        let report = p.run_cycle(&request, &mut rng).expect("cycle");
        assert!(report.status.contains("Sag"));
        assert!(report.status.contains("Unknown Anomaly"), "status {}", report.status);
    }
}
