//! Amplitude stages: the per-oscillator level control and the final
//! envelope/pan stage feeding the stereo bus.

use crate::fixed::{clamp_i32, lix16};
use crate::program::{MiscParams, OscParams};
use crate::tables::{PAN_CENTER_IDX, PAN_TABLE, PAN_TABLE_LEN};

/// Per-oscillator level control. Level 63 is unity.
#[derive(Debug, Default)]
pub struct Dca;

impl Dca {
    pub fn new() -> Dca {
        Dca
    }

    pub fn generate(
        &mut self,
        outp: &mut [i16],
        inp: &[i16],
        _amp: &[i16],
        modps: [&[i8]; 2],
        modamts: [i8; 2],
        params: &OscParams,
    ) {
        let enable = params.dcaenable;
        let level = params.dcalevel as i32; // 0..63

        let modamt1 = clamp_i32(modamts[0] as i32, -63, 63);
        let modamt2 = clamp_i32(modamts[1] as i32, -63, 63);

        for i in 0..outp.len() {
            let m = modps[0][i] as i32 * modamt1 + modps[1][i] as i32 * modamt2;
            let m = m * 127 / 7938; // -127..127

            // TODO ring-mod by the `_amp` oscillator output

            let mut levelmod = clamp_i32(2 * level + m, 0, 127);
            if !enable {
                levelmod = 0;
            }

            outp[i] = (inp[i] as i32 * levelmod / 127) as i16;
        }
    }
}

/// Final stage: scales by the amplitude envelope and spreads across
/// the stereo bus through the pan law. Output is additive so voices
/// accumulate into the same buffers.
#[derive(Debug, Default)]
pub struct Dca4;

impl Dca4 {
    pub fn new() -> Dca4 {
        Dca4
    }

    pub fn generate_adding(
        &mut self,
        outl: &mut [i16],
        outr: &mut [i16],
        inp: &[i16],
        envp: &[i8],
        _panmodp: &[i8],
        params: &MiscParams,
    ) {
        let dca4modamt = params.dca4modamt as i32; // 0..63
        let _panmodamt = clamp_i32(params.panmodamt as i32, -63, 63);

        // PAN centered at 8 and symmetric at 0
        let pan = clamp_i32(params.pan as i32 - 8, -7, 7);

        let panidx = (PAN_CENTER_IDX as i32 + pan * PAN_CENTER_IDX as i32 / 7) as usize;
        let panr = PAN_TABLE[panidx] as i64;
        let panl = PAN_TABLE[PAN_TABLE_LEN - 1 - panidx] as i64;

        for i in 0..outl.len() {
            let am = envp[i] as i32 * dca4modamt; // -3969..+3969
            let dcaout = (inp[i] as i32 * am / 3969) as i64;

            // TODO pan modulation from `_panmodp` once the depth law
            // is measured

            outl[i] = outl[i].saturating_add(lix16(dcaout * panl) as i16);
            outr[i] = outr[i].saturating_add(lix16(dcaout * panr) as i16);
        }
    }
}
