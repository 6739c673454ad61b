//! Four-pole lowpass filter.
//!
//! A ladder model with a saturating feedback path, run twice per
//! sample for stability near Nyquist. Coefficients are refreshed on a
//! short cycle (about 0.3 ms) instead of per sample since the exp call
//! dominates the cost.

use crate::fixed::clamp_i32;
use crate::program::MiscParams;
use crate::tables::{RateTables, VCF_FREQS};

const STAGES: usize = 4;
const OVERSAMPLE: usize = 2;
const Q_MIN: f64 = 0.2;
const Q_MAX: f64 = 0.8;

#[derive(Copy, Clone, Debug, Default)]
struct Stage {
    m1: f64,
    m2: f64,
}

/// Rational tanh approximation, good to a few ulps of f32 over the
/// feedback range.
fn saturate(xx: f64) -> f64 {
    let x = xx as f32;
    let x2 = x * x;
    let a = x * (135135.0 + x2 * (17325.0 + x2 * (378.0 + x2)));
    let b = 135135.0 + x2 * (62370.0 + x2 * (3150.0 + x2 * 28.0));
    (a / b) as f64
}

/// Polynomial fit compensating the cutoff and resonance error of the
/// one-pole-cascade tuning.
fn correction(f: f64, q: f64) -> f64 {
    const P00: f64 = 47.7075588396789e-3;
    const P10: f64 = 1.58879917317302;
    const P01: f64 = -203.211294022804e-3;
    const P20: f64 = 1.58534782723064;
    const P11: f64 = -938.412964110806e-3;
    const P02: f64 = 214.871420454546e-3;
    P00 + P10 * f + P01 * q + P20 * f * f + P11 * f * q + P02 * q * q
}

#[derive(Debug, Default)]
struct Ladder {
    g: f64,
    q: f64,
    fbdelay: f64,
    stage: [Stage; STAGES],
}

impl Ladder {
    fn lp(&mut self, f: f64, q: f64) {
        let f = (correction(f, q) / OVERSAMPLE as f64).min(0.5).max(0.0);
        self.g = 1.0 - (-2.0 * std::f64::consts::PI * f).exp();
        self.q = q;
    }

    fn reset(&mut self) {
        self.fbdelay = 0.0;
        self.stage = [Stage::default(); STAGES];
    }

    fn tick(&mut self, input: f64) -> f64 {
        let g = self.g;
        let q = self.q;

        const COMP: f64 = 0.5;
        let input = input - (saturate(self.fbdelay) - input * COMP) * q * 4.0;

        let mut first = 0.0;
        for o in 0..OVERSAMPLE {
            let mut stagein = input;
            for st in self.stage.iter_mut() {
                let out = st.m2 + g * (stagein * (1.0 / 1.3) + st.m1 * (0.3 / 1.3) - st.m2);
                st.m2 = out;
                st.m1 = stagein;
                stagein = out;
            }
            self.fbdelay = stagein;
            if o == 0 {
                first = stagein;
            }
        }
        first
    }
}

#[derive(Debug, Default)]
pub struct Vcf {
    filter: Ladder,
    cycle: u32,
}

impl Vcf {
    pub fn new() -> Vcf {
        Vcf::default()
    }

    pub fn reset(&mut self) {
        self.filter.reset();
        self.cycle = 0;
    }

    pub fn generate(
        &mut self,
        outp: &mut [i16],
        inp: &[i16],
        modps: [&[i8]; 2],
        modamts: [i8; 2],
        key: u8,
        params: &MiscParams,
        tables: &RateTables,
    ) {
        let modamt1 = clamp_i32(modamts[0] as i32, -63, 63);
        let modamt2 = clamp_i32(modamts[1] as i32, -63, 63);
        let fltfc = params.fltfc as i32;
        let q = params.q as f64 / 31.0;
        let keybd = clamp_i32(params.keybd as i32, -63, 63);

        let fs = tables.sample_rate() as f64;
        let update_cycle = tables.vcf_update_cycle;

        for i in 0..outp.len() {
            let m = modps[0][i] as i32 * modamt1 + modps[1][i] as i32 * modamt2;
            let m = m * 127 / 7938; // -127..127

            let fcidx = clamp_i32(fltfc + m, 0, 127) as usize;
            let mut fc = VCF_FREQS[fcidx] as f64 / fs;
            fc *= 1.0 + 0.0002 * key as f64 * keybd as f64;
            fc = fc.min(0.5).max(0.0);

            const SCALE: f64 = 32767.0;
            let out = SCALE * self.filter.tick(inp[i] as f64 * (1.0 / SCALE));
            outp[i] = clamp_i32(out.round() as i32, -32768, 32767) as i16;

            self.cycle += 1;
            if self.cycle >= update_cycle {
                self.cycle = 0;
                self.filter.lp(fc, q * (Q_MAX - Q_MIN) + Q_MIN);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO: [i8; 4096] = [0; 4096];

    fn misc(fltfc: u8, q: u8) -> MiscParams {
        MiscParams {
            fltfc,
            q,
            ..Default::default()
        }
    }

    fn run(params: &MiscParams, inp: &[i16]) -> Vec<i16> {
        let rt = RateTables::new(48000.0);
        let mut vcf = Vcf::new();
        let mut out = vec![0i16; inp.len()];
        for (ochunk, ichunk) in out.chunks_mut(512).zip(inp.chunks(512)) {
            vcf.generate(
                ochunk,
                ichunk,
                [&ZERO[..ichunk.len()], &ZERO[..ichunk.len()]],
                [0, 0],
                60,
                params,
                &rt,
            );
        }
        out
    }

    fn rms(buf: &[i16]) -> f64 {
        let sum: f64 = buf.iter().map(|&v| v as f64 * v as f64).sum();
        (sum / buf.len() as f64).sqrt()
    }

    fn sine(freq: f64, n: usize) -> Vec<i16> {
        (0..n)
            .map(|i| {
                let t = i as f64 / 48000.0;
                (20000.0 * (2.0 * std::f64::consts::PI * freq * t).sin()) as i16
            })
            .collect()
    }

    #[test]
    fn open_filter_passes_low_frequencies() {
        let out = run(&misc(127, 0), &sine(220.0, 9600));
        // skip the settling time
        assert!(rms(&out[4800..]) > 0.5 * rms(&sine(220.0, 9600)[4800..]));
    }

    #[test]
    fn closed_filter_attenuates_highs() {
        let inp = sine(8000.0, 9600);
        let out = run(&misc(10, 0), &inp);
        assert!(rms(&out[4800..]) < 0.05 * rms(&inp[4800..]));
    }

    #[test]
    fn more_cutoff_passes_more_signal() {
        let inp = sine(2000.0, 9600);
        let dark = run(&misc(30, 0), &inp);
        let bright = run(&misc(120, 0), &inp);
        assert!(rms(&bright[4800..]) > rms(&dark[4800..]));
    }

    #[test]
    fn output_stays_in_range_with_resonance() {
        let inp = sine(1000.0, 9600);
        let out = run(&misc(90, 31), &inp);
        // resonance must neither kill the passband nor drive the
        // stages into a railed square
        let r = rms(&out[4800..]);
        assert!(r > 1000.0, "rms = {}", r);
        assert!(r < 30000.0, "rms = {}", r);
    }
}
