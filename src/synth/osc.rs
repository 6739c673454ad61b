//! Wavetable oscillator.
//!
//! A 32-bit phase accumulator steps through a single-cycle wave at an
//! increment looked up per key from the pitch table. Hard sync resets
//! the phase when the sync input is high; the wrap flag feeds the next
//! oscillator's sync input.

use crate::data::WaveBank;
use crate::fixed::{clamp_i32, ix16};
use crate::program::OscParams;
use crate::tables::{RateTables, OSC_PHI_OVERSAMPLE, OSC_PHI_TABLEN};

#[derive(Debug, Default)]
pub struct Osc {
    phase: u32,
}

impl Osc {
    pub fn new() -> Osc {
        Osc { phase: 0 }
    }

    pub fn reset(&mut self) {
        self.phase = 0;
    }

    pub fn generate(
        &mut self,
        outp: &mut [i16],
        syncinp: &[i8],
        syncoutp: &mut [i8],
        modps: [&[i8]; 2],
        modamts: [i8; 2],
        key: u8,
        params: &OscParams,
        waves: &WaveBank,
        tables: &RateTables,
    ) {
        let modamt1 = clamp_i32(modamts[0] as i32, -63, 63);
        let modamt2 = clamp_i32(modamts[1] as i32, -63, 63);

        let sample = waves.sample_for(params.waveform, key);
        let length = 1u32 << sample.log2length;
        let shift = 32 - sample.log2length;

        let mut phase = self.phase;

        for i in 0..outp.len() {
            let m = modps[0][i] as i32 * modamt1 + modps[1][i] as i32 * modamt2;
            let _pitch_mod = m * 127 / 7938; // -127..127
            // TODO measure the hardware pitch-mod depth, then apply
            // _pitch_mod plus the SEMI/FINE offsets to the pitch index

            let pitch = key as usize * OSC_PHI_OVERSAMPLE;
            let phaseinc = tables.osc_phi[pitch.min(OSC_PHI_TABLEN - 1)];

            let syncd = syncinp[i] > 0;
            let oldphase = phase;
            phase = if syncd { 0 } else { phase.wrapping_add(phaseinc) };
            let wrapd = syncd || phase < oldphase;
            syncoutp[i] = wrapd as i8;

            let i0 = phase >> shift;
            let i1 = if i0 < length - 1 { i0 + 1 } else { 0 };

            let s0 = sample.data[i0 as usize] as i32 * 65534 / 255 - 32767;
            let s1 = sample.data[i1 as usize] as i32 * 65534 / 255 - 32767;

            let frac = ((phase >> (shift - 16)) & 65535) as i32;
            outp[i] = ix16(s1 * frac + s0 * (65536 - frac)) as i16;
        }

        self.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_MOD: [i8; 512] = [0; 512];

    fn run(osc: &mut Osc, key: u8, n: usize, syncin: &[i8]) -> (Vec<i16>, Vec<i8>) {
        let rt = RateTables::new(48000.0);
        let waves = WaveBank::builtin();
        let params = OscParams {
            waveform: 0,
            ..Default::default()
        };
        let mut out = vec![0i16; n];
        let mut syncout = vec![0i8; n];
        for (ochunk, (ichunk, schunk)) in out
            .chunks_mut(512)
            .zip(syncin.chunks(512).zip(syncout.chunks_mut(512)))
        {
            osc.generate(
                ochunk,
                &ichunk[..ochunk.len()],
                schunk,
                [&NO_MOD[..ochunk.len()], &NO_MOD[..ochunk.len()]],
                [0, 0],
                key,
                &params,
                &waves,
                &rt,
            );
        }
        (out, syncout)
    }

    #[test]
    fn wrap_rate_matches_pitch() {
        let mut osc = Osc::new();
        let n = 48000;
        let (_, syncout) = run(&mut osc, 69, n, &vec![0i8; n]);
        let wraps: i32 = syncout.iter().map(|&s| s as i32).sum();
        // concert A, one second
        assert!((wraps - 440).abs() <= 1, "wraps = {}", wraps);
    }

    #[test]
    fn sync_input_pins_phase() {
        let mut osc = Osc::new();
        let n = 64;
        let (out, syncout) = run(&mut osc, 100, n, &vec![1i8; n]);
        assert!(syncout.iter().all(|&s| s == 1));
        // phase frozen at zero: constant output
        assert!(out.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn output_covers_16_bit_range() {
        let mut osc = Osc::new();
        let n = 2048;
        let (out, _) = run(&mut osc, 69, n, &vec![0i8; n]);
        assert!(out.iter().any(|&v| v > 30000));
        assert!(out.iter().any(|&v| v < -30000));
    }
}
