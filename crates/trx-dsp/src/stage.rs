//! Two-direction rate conversion between the device and baseband rates.

use std::sync::Arc;

use num_complex::Complex32;
use tracing::info;

use trx_core::error::Result;
use trx_core::types::{IqSample, SampleRate};

use crate::filter::{FilterDesign, WindowedSinc};
use crate::ratio::ResampleRatio;
use crate::resampler::{CHUNK_BLOCKS, Resampler};

/// Receive (device -> baseband) and transmit (baseband -> device) converters.
///
/// Each direction's [`Resampler`] is built on first use and then lives as
/// long as the stage. The stage converts sample formats at the boundary:
/// 16-bit device samples in and out, `f32` complex samples on the baseband
/// side.
pub struct ResamplingStage {
    rx_ratio: ResampleRatio,
    tx_ratio: ResampleRatio,
    design: Arc<dyn FilterDesign>,
    rx: Option<Resampler>,
    tx: Option<Resampler>,
    scratch_in: Vec<Complex32>,
    scratch_out: Vec<Complex32>,
}

impl ResamplingStage {
    /// A stage using the stock windowed-sinc coefficients.
    pub fn new(device_rate: SampleRate, baseband_rate: SampleRate) -> Result<Self> {
        Self::with_design(device_rate, baseband_rate, Arc::new(WindowedSinc))
    }

    /// A stage whose coefficients come from `design`.
    pub fn with_design(
        device_rate: SampleRate,
        baseband_rate: SampleRate,
        design: Arc<dyn FilterDesign>,
    ) -> Result<Self> {
        let rx_ratio = ResampleRatio::between(device_rate, baseband_rate)?;
        Ok(ResamplingStage {
            rx_ratio,
            tx_ratio: rx_ratio.inverse(),
            design,
            rx: None,
            tx: None,
            scratch_in: Vec::new(),
            scratch_out: Vec::new(),
        })
    }

    pub fn rx_ratio(&self) -> ResampleRatio {
        self.rx_ratio
    }

    pub fn tx_ratio(&self) -> ResampleRatio {
        self.tx_ratio
    }

    /// Device samples consumed per receive chunk.
    pub fn rx_input_chunk(&self) -> usize {
        CHUNK_BLOCKS * self.rx_ratio.q()
    }

    /// Baseband samples consumed per transmit chunk.
    pub fn tx_input_chunk(&self) -> usize {
        CHUNK_BLOCKS * self.tx_ratio.q()
    }

    /// Device samples produced per transmit chunk.
    pub fn tx_output_chunk(&self) -> usize {
        self.tx_ratio.output_len(self.tx_input_chunk())
    }

    /// Receive samples waiting for a chunk boundary.
    pub fn rx_pending(&self) -> usize {
        self.rx.as_ref().map_or(0, Resampler::pending_len)
    }

    /// Transmit samples waiting for a chunk boundary.
    pub fn tx_pending(&self) -> usize {
        self.tx.as_ref().map_or(0, Resampler::pending_len)
    }

    /// Convert device samples to baseband, appending to `output`.
    pub fn rx_convert(&mut self, input: &[IqSample], output: &mut Vec<Complex32>) -> usize {
        let (ratio, design) = (self.rx_ratio, &self.design);
        let rx = self.rx.get_or_insert_with(|| {
            info!(%ratio, "initializing rx resampler");
            Resampler::new(ratio, design.as_ref())
        });

        self.scratch_in.clear();
        self.scratch_in.extend(input.iter().map(|s| s.to_complex()));
        rx.process(&self.scratch_in, output)
    }

    /// Convert baseband samples to device samples, appending to `output`.
    pub fn tx_convert(&mut self, input: &[Complex32], output: &mut Vec<IqSample>) -> usize {
        let (ratio, design) = (self.tx_ratio, &self.design);
        let tx = self.tx.get_or_insert_with(|| {
            info!(%ratio, "initializing tx resampler");
            Resampler::new(ratio, design.as_ref())
        });

        self.scratch_out.clear();
        let produced = tx.process(input, &mut self.scratch_out);
        output.extend(
            self.scratch_out
                .iter()
                .map(|&c| IqSample::from_complex_saturating(c)),
        );
        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gsm_stage() -> ResamplingStage {
        ResamplingStage::new(
            SampleRate::hz(400_000).unwrap(),
            SampleRate::new(1_625_000, 6).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn gsm_geometry() {
        let stage = gsm_stage();
        assert_eq!((stage.rx_ratio().p(), stage.rx_ratio().q()), (65, 96));
        assert_eq!(stage.rx_input_chunk(), 864);
        assert_eq!(stage.tx_input_chunk(), 585);
        assert_eq!(stage.tx_output_chunk(), 864);
    }

    #[test]
    fn resamplers_are_lazy() {
        let mut stage = gsm_stage();
        assert!(stage.rx.is_none());
        assert!(stage.tx.is_none());

        let mut out = Vec::new();
        stage.rx_convert(&[IqSample::ZERO; 10], &mut out);
        assert!(stage.rx.is_some());
        assert!(stage.tx.is_none());
        assert_eq!(stage.rx_pending(), 10);
    }

    #[test]
    fn rx_chunk_produces_baseband_chunk() {
        let mut stage = gsm_stage();
        let input = vec![IqSample::new(100, -100); 864];
        let mut out = Vec::new();
        assert_eq!(stage.rx_convert(&input, &mut out), 585);
        assert_eq!(out.len(), 585);
    }

    #[test]
    fn tx_chunk_produces_device_chunk() {
        let mut stage = gsm_stage();
        let input = vec![Complex32::new(1000.0, 0.0); 585 * 2];
        let mut out = Vec::new();
        assert_eq!(stage.tx_convert(&input, &mut out), 864 * 2);
        assert_eq!(out.len(), 864 * 2);

        // Steady state of the second chunk holds the DC level.
        for s in &out[864..] {
            assert!((i32::from(s.i) - 1000).abs() <= 20, "i = {}", s.i);
            assert!(s.q.abs() <= 20);
        }
    }

    #[test]
    fn directions_are_independent() {
        let mut stage = gsm_stage();
        let mut bb = Vec::new();
        let mut dev = Vec::new();
        stage.tx_convert(&[Complex32::new(1.0, 1.0); 100], &mut dev);
        stage.rx_convert(&[IqSample::new(1, 1); 50], &mut bb);
        assert_eq!(stage.tx_pending(), 100);
        assert_eq!(stage.rx_pending(), 50);
    }
}
