//! Lookup tables used by the synthesis components.
//!
//! Rate-independent tables live in lazy statics. Everything that depends
//! on the sample rate goes into `RateTables`, built once at startup by
//! the instrument and handed to the voices by reference.

use lazy_static::lazy_static;
use std::f64::consts::PI;

/// Number of entries in the stereo pan law table.
pub const PAN_TABLE_LEN: usize = 511;

/// Index of the center pan position.
pub const PAN_CENTER_IDX: usize = (PAN_TABLE_LEN - 1) / 2;

/// Entries in the saturation transfer table.
pub const SAT_SHAPE_LEN: usize = 32768;

/// Taps in the 4x antialias filter.
pub const SAT_FIR_TAPS: usize = 64;

/// Sub-semitone resolution of the oscillator pitch table.
pub const OSC_PHI_OVERSAMPLE: usize = 8;

/// Entries in the oscillator pitch table.
pub const OSC_PHI_TABLEN: usize = 128 * OSC_PHI_OVERSAMPLE;

lazy_static! {
    /// Stereo pan law, Q16.16, -3 dB at the center.
    /// `(cos(r)+sin(r))/sqrt(2)` with `r = (pi/4)*((2n/(N-1))-1)`.
    pub static ref PAN_TABLE: Vec<u32> = build_pan_table();

    /// Time values in seconds for the envelope T1-T4 parameters.
    pub static ref ENV_TIMES: [f32; 64] = build_env_times();

    /// LFO frequency in Hz per FREQ parameter value.
    /// `a1*x` below 8, `a2*(x-6)` above, fitted to hardware measurements.
    pub static ref LFO_FREQS: [f32; 64] = build_lfo_freqs();

    /// LFO onset delay in seconds per DELAY parameter value,
    /// `a*exp(b*x) + c*exp(d*x)`, approximated by ear.
    pub static ref LFO_DELAYS: [f32; 64] = build_lfo_delays();

    /// Filter cutoff in Hz per FC parameter value, `a*exp(b*x)`.
    pub static ref VCF_FREQS: [f32; 128] = build_vcf_freqs();

    /// One cycle of the LFO triangle, indexed by the top 8 phase bits.
    pub static ref LFO_TRI: [i8; 256] = build_lfo_tri();

    /// Positive half of the odd-symmetric soft clip curve `r - r^3/3`.
    pub static ref SAT_SHAPE: Vec<i16> = build_sat_shape();

    /// Lowpass for 4x over/decimation around the waveshaper,
    /// windowed sinc at a quarter of the oversampled Nyquist,
    /// normalized to unity DC gain.
    pub static ref SAT_FIR: [f32; SAT_FIR_TAPS] = build_sat_fir();

    /// Velocity-squared curve: `63*sin(acos((127-v)/127))`.
    pub static ref VEL_SQUARE: [i8; 127] = build_vel_square();
}

fn build_pan_table() -> Vec<u32> {
    let mut t = Vec::with_capacity(PAN_TABLE_LEN);
    for n in 0..PAN_TABLE_LEN {
        let r = (PI / 4.0) * ((2.0 * n as f64 / (PAN_TABLE_LEN - 1) as f64) - 1.0);
        let v = (r.cos() + r.sin()) / 2.0f64.sqrt();
        t.push((v * 65536.0).round() as u32);
    }
    t
}

fn build_env_times() -> [f32; 64] {
    // Exponential fit through zero, topping out near 18 seconds.
    let mut t = [0.0f32; 64];
    for (i, v) in t.iter_mut().enumerate() {
        *v = (0.005 * ((0.13 * i as f64).exp() - 1.0)) as f32;
    }
    t
}

fn build_lfo_freqs() -> [f32; 64] {
    const A1: f64 = 0.04347471496598639;
    const A2: f64 = 0.31470527365073292;
    let mut t = [0.0f32; 64];
    for (i, v) in t.iter_mut().enumerate() {
        let x = i as f64;
        *v = if x < 8.0 { A1 * x } else { A2 * (x - 6.0) } as f32;
    }
    t
}

fn build_lfo_delays() -> [f32; 64] {
    let mut t = [0.0f32; 64];
    for (i, v) in t.iter_mut().enumerate() {
        let x = i as f64;
        *v = (10.87 * (-0.4496 * x).exp() + 1.724 * (-0.03158 * x).exp()) as f32;
    }
    t
}

fn build_vcf_freqs() -> [f32; 128] {
    let mut t = [0.0f32; 128];
    for (i, v) in t.iter_mut().enumerate() {
        *v = (48.87 * (0.05792 * i as f64).exp()) as f32;
    }
    t
}

fn build_lfo_tri() -> [i8; 256] {
    let mut t = [0i8; 256];
    for (i, v) in t.iter_mut().enumerate() {
        let i = i as i32;
        let n = i.max(0).min(64) - (i - 64).max(0).min(128) + (i - 192).max(0).min(63);
        *v = ((n as f64) * 127.0 / 64.0).round() as i8;
    }
    t
}

fn build_sat_shape() -> Vec<i16> {
    let mut t = Vec::with_capacity(SAT_SHAPE_LEN);
    for i in 0..SAT_SHAPE_LEN {
        let r = i as f64 / (SAT_SHAPE_LEN - 1) as f64;
        let sat = r - r * r * r / 3.0;
        t.push((sat * 32767.0).round() as i16);
    }
    t
}

fn build_sat_fir() -> [f32; SAT_FIR_TAPS] {
    let mut t = [0.0f64; SAT_FIR_TAPS];
    let fc = 0.125; // of the oversampled rate
    let center = (SAT_FIR_TAPS - 1) as f64 / 2.0;
    let mut sum = 0.0;
    for (i, v) in t.iter_mut().enumerate() {
        let x = i as f64 - center;
        let sinc = if x == 0.0 {
            2.0 * fc
        } else {
            (2.0 * PI * fc * x).sin() / (PI * x)
        };
        let w = 0.42 - 0.5 * (2.0 * PI * i as f64 / (SAT_FIR_TAPS - 1) as f64).cos()
            + 0.08 * (4.0 * PI * i as f64 / (SAT_FIR_TAPS - 1) as f64).cos();
        *v = sinc * w;
        sum += *v;
    }
    let mut out = [0.0f32; SAT_FIR_TAPS];
    for (o, v) in out.iter_mut().zip(t.iter()) {
        *o = (v / sum) as f32;
    }
    out
}

fn build_vel_square() -> [i8; 127] {
    let mut t = [0i8; 127];
    for (i, v) in t.iter_mut().enumerate() {
        let r = (127.0 - i as f64) / 127.0;
        *v = (63.0 * r.acos().sin()).round() as i8;
    }
    t
}

/// Sample rate dependent tables, computed once and shared by all voices.
#[derive(Debug)]
pub struct RateTables {
    sample_rate: f32,
    /// Oscillator phase increment per eighth of a semitone.
    pub osc_phi: Vec<u32>,
    /// LFO phase increment, Q8.24 through a 256-unit cycle.
    pub lfo_phi: [u32; 64],
    /// Envelope segment times in samples.
    pub env_times: [u32; 64],
    /// Samples between filter coefficient updates.
    pub vcf_update_cycle: u32,
}

impl RateTables {
    pub fn new(sample_rate: f32) -> RateTables {
        let fs = sample_rate as f64;

        let mut osc_phi = Vec::with_capacity(OSC_PHI_TABLEN);
        for i in 0..128 {
            for j in 0..OSC_PHI_OVERSAMPLE {
                let key = i as f64 + j as f64 / OSC_PHI_OVERSAMPLE as f64;
                let freq = 440.0 * ((key - 69.0) / 12.0).exp2();
                osc_phi.push((freq / fs * u32::MAX as f64) as u32);
            }
        }

        let mut lfo_phi = [0u32; 64];
        for (i, v) in lfo_phi.iter_mut().enumerate() {
            *v = (256.0 * LFO_FREQS[i] as f64 / fs * 16777216.0) as u32;
        }

        let mut env_times = [0u32; 64];
        for (i, v) in env_times.iter_mut().enumerate() {
            *v = (ENV_TIMES[i] as f64 * fs).round() as u32;
        }

        let vcf_update_cycle = ((fs * 3e-4).round() as u32).max(1);

        RateTables {
            sample_rate,
            osc_phi,
            lfo_phi,
            env_times,
            vcf_update_cycle,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

/// Nearest FREQ parameter value for a frequency in Hz.
pub fn lfo_freqidx(f: f32) -> usize {
    let mut i = 0;
    while i < 63 && f > LFO_FREQS[i + 1] {
        i += 1;
    }
    if i == 63 {
        return 63;
    }
    if f - LFO_FREQS[i] < LFO_FREQS[i + 1] - f {
        i
    } else {
        i + 1
    }
}

/// Nearest T parameter value for a duration in seconds.
pub fn env_timeidx(t: f32) -> usize {
    let mut i = 0;
    while i < 63 && t > ENV_TIMES[i + 1] {
        i += 1;
    }
    if i == 63 {
        return 63;
    }
    if t - ENV_TIMES[i] < ENV_TIMES[i + 1] - t {
        i
    } else {
        i + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pan_table_shape() {
        assert_eq!(PAN_TABLE.len(), PAN_TABLE_LEN);
        assert_eq!(PAN_TABLE[0], 0);
        assert_eq!(PAN_TABLE[PAN_TABLE_LEN - 1], 65536);
        // -3 dB at the center
        let center = PAN_TABLE[PAN_CENTER_IDX] as f64 / 65536.0;
        assert!((center - 1.0 / 2.0f64.sqrt()).abs() < 1e-3);
    }

    #[test]
    fn lfo_tri_extremes() {
        assert_eq!(LFO_TRI[0], 0);
        assert_eq!(LFO_TRI[64], 127);
        assert_eq!(LFO_TRI[192], -127);
    }

    #[test]
    fn sat_shape_monotonic() {
        assert_eq!(SAT_SHAPE[0], 0);
        for w in SAT_SHAPE.windows(2) {
            assert!(w[1] >= w[0]);
        }
        // r - r^3/3 at r=1 is 2/3
        let top = SAT_SHAPE[SAT_SHAPE_LEN - 1] as f64 / 32767.0;
        assert!((top - 2.0 / 3.0).abs() < 1e-3);
    }

    #[test]
    fn sat_fir_unity_dc() {
        let sum: f32 = SAT_FIR.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn osc_phi_concert_pitch() {
        let rt = RateTables::new(48000.0);
        let phi = rt.osc_phi[69 * OSC_PHI_OVERSAMPLE];
        let expect = (440.0 / 48000.0 * u32::MAX as f64) as u32;
        assert!((phi as i64 - expect as i64).abs() <= 1);
    }

    #[test]
    fn freqidx_roundtrip() {
        for i in 0..64 {
            assert_eq!(lfo_freqidx(LFO_FREQS[i]), i);
        }
    }

    #[test]
    fn timeidx_roundtrip() {
        for i in 0..64 {
            assert_eq!(env_timeidx(ENV_TIMES[i]), i);
        }
    }

    #[test]
    fn freqidx_saturates_past_table_end() {
        assert_eq!(lfo_freqidx(LFO_FREQS[63] + 1.0), 63);
        assert_eq!(lfo_freqidx(1000.0), 63);
    }

    #[test]
    fn timeidx_saturates_past_table_end() {
        assert_eq!(env_timeidx(ENV_TIMES[63] + 1.0), 63);
        assert_eq!(env_timeidx(1.0e6), 63);
    }

    #[test]
    fn lfo_delays_decrease() {
        for w in LFO_DELAYS.windows(2) {
            assert!(w[1] < w[0]);
        }
        assert!((LFO_DELAYS[0] - 12.594).abs() < 1e-3);
    }

    #[test]
    fn vel_square_curve() {
        assert_eq!(VEL_SQUARE[0], 0);
        assert_eq!(VEL_SQUARE[126], 63);
        for w in VEL_SQUARE.windows(2) {
            assert!(w[1] >= w[0]);
        }
    }
}
