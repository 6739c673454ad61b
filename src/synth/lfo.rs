//! Low frequency oscillator.
//!
//! Phase is a wrapping Q8.24 accumulator over a 256-unit cycle; the
//! integer part indexes the waveform directly. Output covers ±63 after
//! the final halving.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::data::LfoWave;
use crate::fixed::ix8u;
use crate::program::LfoParams;
use crate::tables::{RateTables, LFO_TRI};

#[derive(Debug)]
pub struct Lfo {
    phase: u32,
    noise: SmallRng,
}

impl Lfo {
    pub fn new(seed: u64) -> Lfo {
        Lfo {
            phase: 0,
            noise: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn reset(&mut self) {
        self.phase = 0;
    }

    #[cfg(test)]
    fn set_phase(&mut self, phase: u32) {
        self.phase = phase;
    }

    /// `modp` is the depth modulation input selected by the MOD
    /// parameter; the depth path (L1/L2/DELAY) is not wired up yet, so
    /// the input is accepted and ignored.
    pub fn generate(
        &mut self,
        outp: &mut [i8],
        _modp: &[i8],
        params: &LfoParams,
        tables: &RateTables,
    ) {
        let mut phase = self.phase;
        let phi = tables.lfo_phi[(params.freq & 0x3f) as usize];

        match LfoWave::from_index(params.wav) {
            LfoWave::Tri => {
                for out in outp.iter_mut() {
                    *out = LFO_TRI[ix8u(phase) as usize];
                    phase = phase.wrapping_add(phi);
                }
            }
            LfoWave::Saw => {
                for out in outp.iter_mut() {
                    let saw = 255 - ix8u(phase);
                    *out = ((saw * 254 / 255) as i32 - 127) as i8;
                    phase = phase.wrapping_add(phi);
                }
            }
            LfoWave::Sqr => {
                for out in outp.iter_mut() {
                    *out = if phase < 128 << 24 { 0 } else { 127 };
                    phase = phase.wrapping_add(phi);
                }
            }
            LfoWave::Noi => {
                for out in outp.iter_mut() {
                    let noi = self.noise.gen::<u32>() % 255;
                    *out = (noi as i32 - 127) as i8;
                    phase = phase.wrapping_add(phi);
                }
            }
        }

        for out in outp.iter_mut() {
            *out /= 2;
        }

        self.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(freq: u8, wav: u8) -> LfoParams {
        LfoParams {
            freq,
            wav,
            ..Default::default()
        }
    }

    #[test]
    fn triangle_stays_in_half_range() {
        let rt = RateTables::new(48000.0);
        let mut lfo = Lfo::new(1);
        let mut out = [0i8; 4096];
        lfo.generate(&mut out, &[], &params(63, 0), &rt);
        assert!(out.iter().any(|&v| v > 50));
        assert!(out.iter().any(|&v| v < -50));
        assert!(out.iter().all(|&v| v >= -64 && v <= 63));
    }

    #[test]
    fn square_splits_at_midpoint() {
        let rt = RateTables::new(48000.0);
        let mut lfo = Lfo::new(1);
        let mut out = [0i8; 2];
        lfo.generate(&mut out, &[], &params(0, 2), &rt);
        // freq 0 never advances: stuck at phase 0, low half
        assert_eq!(out, [0, 0]);

        let mut lfo = Lfo::new(1);
        lfo.set_phase(200 << 24);
        let mut out = [0i8; 2];
        lfo.generate(&mut out, &[], &params(0, 2), &rt);
        assert_eq!(out, [63, 63]);
    }

    #[test]
    fn reset_restarts_phase() {
        let rt = RateTables::new(48000.0);
        let mut lfo = Lfo::new(1);
        let mut first = [0i8; 64];
        lfo.generate(&mut first, &[], &params(40, 1), &rt);
        lfo.reset();
        let mut second = [0i8; 64];
        lfo.generate(&mut second, &[], &params(40, 1), &rt);
        assert_eq!(first, second);
    }

    #[test]
    fn noise_is_deterministic_per_seed() {
        let rt = RateTables::new(48000.0);
        let mut a = Lfo::new(7);
        let mut b = Lfo::new(7);
        let mut outa = [0i8; 64];
        let mut outb = [0i8; 64];
        a.generate(&mut outa, &[], &params(20, 3), &rt);
        b.generate(&mut outb, &[], &params(20, 3), &rt);
        assert_eq!(outa, outb);
    }
}
