//! Sound program: the parameter set of one patch.
//!
//! The in-memory representation is unpacked plain fields; `pack` and
//! `unpack` translate to the 102-byte packed layout used by the binary
//! and sysex bank formats. All external edits go through the indexed
//! accessor so range clamping stays in one place.

use serde::{Deserialize, Serialize};

use crate::fixed::clamp_i32;

pub const PROGRAM_NAME_LEN: usize = 6;
pub const PROGRAM_PACKED_SIZE: usize = 102;
pub const PARAM_COUNT: usize = 141;

pub const ENV_COUNT: usize = 3 + 1; // 3 assignable + amplitude
pub const LFO_COUNT: usize = 3;
pub const OSC_COUNT: usize = 3;

const ENV_PARAMS: usize = 12;
const LFO_PARAMS: usize = 8;
const OSC_PARAMS: usize = 14;

const FIRST_LFO_PARAM: usize = ENV_COUNT * ENV_PARAMS; // 48
const FIRST_OSC_PARAM: usize = FIRST_LFO_PARAM + LFO_COUNT * LFO_PARAMS; // 72
const FIRST_MISC_PARAM: usize = FIRST_OSC_PARAM + OSC_COUNT * OSC_PARAMS; // 114

/// Envelope parameters. Levels are signed, times index the 64-entry
/// time table. LV/T1V/TK (velocity and key scaling) and the LE/R2
/// flags are stored for format fidelity but not yet applied.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq)]
pub struct EnvParams {
    pub l1: i8,
    pub l2: i8,
    pub l3: i8,
    pub t1: u8,
    pub t2: u8,
    pub t3: u8,
    pub t4: u8,
    pub lv: u8,
    pub t1v: u8,
    pub tk: u8,
    pub le: bool,
    pub r2: bool,
}

#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq)]
pub struct LfoParams {
    pub freq: u8,
    pub wav: u8,
    pub l1: u8,
    pub l2: u8,
    pub mod_src: u8,
    pub delay: u8,
    pub human: bool,
    pub reset: bool,
}

/// Oscillator parameters. Octave and semitone are packed into one
/// field; the composite accessors keep the stored value in range.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq)]
pub struct OscParams {
    pub octsemi: u8,
    pub fine: u8,
    pub fmsrc1: u8,
    pub fmsrc2: u8,
    pub fcmodamt1: i8,
    pub fcmodamt2: i8,
    pub waveform: u8,
    pub dcalevel: u8,
    pub dcaenable: bool,
    pub amsrc1: u8,
    pub amsrc2: u8,
    pub amamt1: i8,
    pub amamt2: i8,
}

impl OscParams {
    pub fn oct(&self) -> i32 {
        ((self.octsemi / 12) as i32 - 3).min(5)
    }

    pub fn semi(&self) -> u8 {
        self.octsemi % 12
    }

    pub fn set_oct(&mut self, oct: i32) {
        let oct = clamp_i32(oct + 3, 0, 8) as u8;
        self.octsemi = oct * 12 + self.semi();
    }

    pub fn set_semi(&mut self, semi: u8) {
        let oct = (self.oct() + 3) as u8;
        self.octsemi = oct * 12 + semi.min(11);
    }
}

#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq)]
pub struct MiscParams {
    pub dca4modamt: u8,
    pub am: bool,
    pub fltfc: u8,
    pub sync: bool,
    pub q: u8,
    pub fcsrc1: u8,
    pub fcsrc2: u8,
    pub fcmodamt1: i8,
    pub vc: bool,
    pub fcmodamt2: i8,
    pub mono: bool,
    pub keybd: u8,
    pub env: bool,
    pub glide: u8,
    pub osc: bool,
    pub splitpoint: u8,
    pub splitdir: bool,
    pub layerprg: u8,
    pub layer: bool,
    pub splitprg: u8,
    pub split: bool,
    pub splitlayerprg: u8,
    pub splitlayer: bool,
    pub panmodsrc: u8,
    pub pan: u8,
    pub panmodamt: i8,
    pub cycle: bool,
}

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq)]
pub struct Program {
    pub name: [u8; PROGRAM_NAME_LEN],
    pub envs: [EnvParams; ENV_COUNT],
    pub lfos: [LfoParams; LFO_COUNT],
    pub oscs: [OscParams; OSC_COUNT],
    pub misc: MiscParams,
}

impl Default for Program {
    fn default() -> Self {
        Program::init()
    }
}

impl Program {
    /// The initial program: one enabled sawtooth oscillator with a
    /// plain organ-style envelope and an open filter.
    pub fn init() -> Program {
        let env = EnvParams {
            l1: 63,
            l2: 48,
            l3: 32,
            t1: 0,
            t2: 20,
            t3: 20,
            t4: 15,
            ..Default::default()
        };
        let lfo = LfoParams {
            freq: 20,
            reset: true,
            ..Default::default()
        };
        let osc = OscParams {
            octsemi: 36, // octave 0, semitone 0
            ..Default::default()
        };

        let mut pgm = Program {
            name: *b"INIT  ",
            envs: [env; ENV_COUNT],
            lfos: [lfo; LFO_COUNT],
            oscs: [osc; OSC_COUNT],
            misc: MiscParams {
                dca4modamt: 63,
                fltfc: 127,
                keybd: 32,
                pan: 8,
                env: true,
                osc: true,
                ..Default::default()
            },
        };
        pgm.oscs[0].dcalevel = 63;
        pgm.oscs[0].dcaenable = true;
        pgm
    }

    /// Name with trailing spaces removed.
    pub fn name_str(&self) -> String {
        let mut n = PROGRAM_NAME_LEN;
        while n > 0 && (self.name[n - 1] == b' ' || self.name[n - 1] == 0) {
            n -= 1;
        }
        String::from_utf8_lossy(&self.name[..n]).into_owned()
    }

    /// Sets the name, truncated to six characters and space padded.
    /// Returns whether the name changed.
    pub fn rename(&mut self, name: &str) -> bool {
        let bytes = name.as_bytes();
        let n = bytes.len().min(PROGRAM_NAME_LEN);
        if &bytes[..n] == self.name_str().as_bytes() {
            return false;
        }
        let mut buf = [b' '; PROGRAM_NAME_LEN];
        buf[..n].copy_from_slice(&bytes[..n]);
        self.name = buf;
        true
    }

    pub fn get_parameter(&self, idx: usize) -> i32 {
        match idx {
            0..=47 => {
                let e = &self.envs[idx / ENV_PARAMS];
                match idx % ENV_PARAMS {
                    0 => e.l1 as i32,
                    1 => e.l2 as i32,
                    2 => e.l3 as i32,
                    3 => e.t1 as i32,
                    4 => e.t2 as i32,
                    5 => e.t3 as i32,
                    6 => e.t4 as i32,
                    7 => e.lv as i32,
                    8 => e.t1v as i32,
                    9 => e.tk as i32,
                    10 => e.le as i32,
                    _ => e.r2 as i32,
                }
            }
            48..=71 => {
                let l = &self.lfos[(idx - FIRST_LFO_PARAM) / LFO_PARAMS];
                match (idx - FIRST_LFO_PARAM) % LFO_PARAMS {
                    0 => l.freq as i32,
                    1 => l.wav as i32,
                    2 => l.l1 as i32,
                    3 => l.l2 as i32,
                    4 => l.mod_src as i32,
                    5 => l.delay as i32,
                    6 => l.human as i32,
                    _ => l.reset as i32,
                }
            }
            72..=113 => {
                let o = &self.oscs[(idx - FIRST_OSC_PARAM) / OSC_PARAMS];
                match (idx - FIRST_OSC_PARAM) % OSC_PARAMS {
                    0 => o.oct(),
                    1 => o.semi() as i32,
                    2 => o.fine as i32,
                    3 => o.fmsrc1 as i32,
                    4 => o.fmsrc2 as i32,
                    5 => o.fcmodamt1 as i32,
                    6 => o.fcmodamt2 as i32,
                    7 => o.waveform as i32,
                    8 => o.dcalevel as i32,
                    9 => o.dcaenable as i32,
                    10 => o.amsrc1 as i32,
                    11 => o.amsrc2 as i32,
                    12 => o.amamt1 as i32,
                    _ => o.amamt2 as i32,
                }
            }
            114..=140 => {
                let m = &self.misc;
                match idx {
                    114 => m.dca4modamt as i32,
                    115 => m.am as i32,
                    116 => m.fltfc as i32,
                    117 => m.sync as i32,
                    118 => m.q as i32,
                    119 => m.fcsrc1 as i32,
                    120 => m.fcsrc2 as i32,
                    121 => m.fcmodamt1 as i32,
                    122 => m.vc as i32,
                    123 => m.fcmodamt2 as i32,
                    124 => m.mono as i32,
                    125 => m.keybd as i32,
                    126 => m.env as i32,
                    127 => m.glide as i32,
                    128 => m.osc as i32,
                    129 => m.splitpoint as i32,
                    130 => m.splitdir as i32,
                    131 => m.layerprg as i32,
                    132 => m.layer as i32,
                    133 => m.splitprg as i32,
                    134 => m.split as i32,
                    135 => m.splitlayerprg as i32,
                    136 => m.splitlayer as i32,
                    137 => m.panmodsrc as i32,
                    138 => m.pan as i32,
                    139 => m.panmodamt as i32,
                    _ => m.cycle as i32,
                }
            }
            _ => 0,
        }
    }

    /// Sets a parameter, clamping the value into its range. Returns
    /// whether the stored value changed.
    pub fn set_parameter(&mut self, idx: usize, val: i32) -> bool {
        if idx >= PARAM_COUNT {
            return false;
        }
        let val = Self::clamp_parameter_value(idx, val);
        if self.get_parameter(idx) == val {
            return false;
        }
        match idx {
            0..=47 => {
                let e = &mut self.envs[idx / ENV_PARAMS];
                match idx % ENV_PARAMS {
                    0 => e.l1 = val as i8,
                    1 => e.l2 = val as i8,
                    2 => e.l3 = val as i8,
                    3 => e.t1 = val as u8,
                    4 => e.t2 = val as u8,
                    5 => e.t3 = val as u8,
                    6 => e.t4 = val as u8,
                    7 => e.lv = val as u8,
                    8 => e.t1v = val as u8,
                    9 => e.tk = val as u8,
                    10 => e.le = val != 0,
                    _ => e.r2 = val != 0,
                }
            }
            48..=71 => {
                let l = &mut self.lfos[(idx - FIRST_LFO_PARAM) / LFO_PARAMS];
                match (idx - FIRST_LFO_PARAM) % LFO_PARAMS {
                    0 => l.freq = val as u8,
                    1 => l.wav = val as u8,
                    2 => l.l1 = val as u8,
                    3 => l.l2 = val as u8,
                    4 => l.mod_src = val as u8,
                    5 => l.delay = val as u8,
                    6 => l.human = val != 0,
                    _ => l.reset = val != 0,
                }
            }
            72..=113 => {
                let o = &mut self.oscs[(idx - FIRST_OSC_PARAM) / OSC_PARAMS];
                match (idx - FIRST_OSC_PARAM) % OSC_PARAMS {
                    0 => o.set_oct(val),
                    1 => o.set_semi(val as u8),
                    2 => o.fine = val as u8,
                    3 => o.fmsrc1 = val as u8,
                    4 => o.fmsrc2 = val as u8,
                    5 => o.fcmodamt1 = val as i8,
                    6 => o.fcmodamt2 = val as i8,
                    7 => o.waveform = val as u8,
                    8 => o.dcalevel = val as u8,
                    9 => o.dcaenable = val != 0,
                    10 => o.amsrc1 = val as u8,
                    11 => o.amsrc2 = val as u8,
                    12 => o.amamt1 = val as i8,
                    _ => o.amamt2 = val as i8,
                }
            }
            _ => {
                let m = &mut self.misc;
                match idx {
                    114 => m.dca4modamt = val as u8,
                    115 => m.am = val != 0,
                    116 => m.fltfc = val as u8,
                    117 => m.sync = val != 0,
                    118 => m.q = val as u8,
                    119 => m.fcsrc1 = val as u8,
                    120 => m.fcsrc2 = val as u8,
                    121 => m.fcmodamt1 = val as i8,
                    122 => m.vc = val != 0,
                    123 => m.fcmodamt2 = val as i8,
                    124 => m.mono = val != 0,
                    125 => m.keybd = val as u8,
                    126 => m.env = val != 0,
                    127 => m.glide = val as u8,
                    128 => m.osc = val != 0,
                    129 => m.splitpoint = val as u8,
                    130 => m.splitdir = val != 0,
                    131 => m.layerprg = val as u8,
                    132 => m.layer = val != 0,
                    133 => m.splitprg = val as u8,
                    134 => m.split = val != 0,
                    135 => m.splitlayerprg = val as u8,
                    136 => m.splitlayer = val != 0,
                    137 => m.panmodsrc = val as u8,
                    138 => m.pan = val as u8,
                    139 => m.panmodamt = val as i8,
                    _ => m.cycle = val != 0,
                }
            }
        }
        true
    }

    pub fn parameter_range(idx: usize) -> (i32, i32) {
        match idx {
            0..=47 => match idx % ENV_PARAMS {
                0..=2 => (-64, 63),
                3..=9 => (0, 63),
                _ => (0, 1),
            },
            48..=71 => match (idx - FIRST_LFO_PARAM) % LFO_PARAMS {
                0 | 2 | 3 | 5 => (0, 63),
                1 => (0, 3),
                4 => (0, 15),
                _ => (0, 1),
            },
            72..=113 => match (idx - FIRST_OSC_PARAM) % OSC_PARAMS {
                0 => (-3, 5),
                1 => (0, 11),
                2 => (0, 31),
                3 | 4 | 10 | 11 => (0, 15),
                5 | 6 | 12 | 13 => (-64, 63),
                7 => (0, 255),
                8 => (0, 63),
                _ => (0, 1),
            },
            114..=140 => match idx {
                114 | 125 | 127 => (0, 63),
                116 | 129 | 131 | 133 | 135 => (0, 127),
                118 => (0, 31),
                119 | 120 | 137 | 138 => (0, 15),
                121 | 123 | 139 => (-64, 63),
                _ => (0, 1),
            },
            _ => (0, 0),
        }
    }

    pub fn clamp_parameter_value(idx: usize, val: i32) -> i32 {
        let (min, max) = Self::parameter_range(idx);
        clamp_i32(val, min, max)
    }

    pub fn parameter_name(idx: usize) -> String {
        const ENV_NAMES: [&str; ENV_PARAMS] = [
            "L1", "L2", "L3", "T1", "T2", "T3", "T4", "LV", "T1V", "TK", "LE", "R2",
        ];
        const LFO_NAMES: [&str; LFO_PARAMS] =
            ["FREQ", "WAV", "L1", "L2", "MOD", "DELAY", "HUMAN", "RESET"];
        const OSC_NAMES: [&str; OSC_PARAMS] = [
            "OCT", "SEMI", "FINE", "FMSRC1", "FMSRC2", "FCMODAMT1", "FCMODAMT2", "WAVEFORM",
            "DCALEVEL", "DCAENABLE", "AMSRC1", "AMSRC2", "AMAMT1", "AMAMT2",
        ];
        const MISC_NAMES: [&str; 27] = [
            "DCA4MODAMT", "AM", "FLTFC", "SYNC", "Q", "FCSRC1", "FCSRC2", "FCMODAMT1", "VC",
            "FCMODAMT2", "MONO", "KEYBD", "ENV", "GLIDE", "OSC", "SPLITPOINT", "SPLITDIR",
            "LAYERPRG", "LAYER", "SPLITPRG", "SPLIT", "SPLITLAYERPRG", "SPLITLAYER", "PANMODSRC",
            "PAN", "PANMODAMT", "CYCLE",
        ];

        match idx {
            0..=47 => format!("Env{}.{}", idx / ENV_PARAMS + 1, ENV_NAMES[idx % ENV_PARAMS]),
            48..=71 => format!(
                "Lfo{}.{}",
                (idx - FIRST_LFO_PARAM) / LFO_PARAMS + 1,
                LFO_NAMES[(idx - FIRST_LFO_PARAM) % LFO_PARAMS]
            ),
            72..=113 => format!(
                "Osc{}.{}",
                (idx - FIRST_OSC_PARAM) / OSC_PARAMS + 1,
                OSC_NAMES[(idx - FIRST_OSC_PARAM) % OSC_PARAMS]
            ),
            114..=140 => format!("Misc.{}", MISC_NAMES[idx - FIRST_MISC_PARAM]),
            _ => String::new(),
        }
    }

    /// Applies a 7-bit controller value scaled across the parameter's
    /// range.
    pub fn set_u7_parameter(&mut self, idx: usize, val7: i32) -> bool {
        let (min, max) = Self::parameter_range(idx);
        let val = clamp_i32(min + val7 * (max - min) / 127, min, max);
        self.set_parameter(idx, val)
    }

    /// Maps an NRPN number to a parameter index and applies the 7-bit
    /// data-entry value. The NRPN space groups parameters in its own
    /// historical order, different from the parameter index order.
    pub fn apply_nrpn(&mut self, nrpn: usize, val7: i32) -> bool {
        const LFO_MAP: [usize; 8] = [0, 7, 6, 1, 2, 5, 3, 4];
        const OSC_MAP: [usize; 8] = [0, 1, 2, 7, 3, 5, 4, 6];
        const DCA_MAP: [usize; 6] = [8, 9, 10, 12, 11, 13];
        const MISC_MAP: [usize; 26] = [
            114, 138, 137, 139, 116, 118, 125, 119, 121, 120, 123, 115, 127, 124, 117, 122, 126,
            128, 140, 132, 131, 136, 135, 130, 133, 129,
        ];

        let idx = match nrpn {
            0..=39 => (nrpn / 10) * ENV_PARAMS + nrpn % 10,
            40..=63 => {
                let n = nrpn - 40;
                FIRST_LFO_PARAM + (n / 8) * LFO_PARAMS + LFO_MAP[n % 8]
            }
            64..=87 => {
                let n = nrpn - 64;
                FIRST_OSC_PARAM + (n / 8) * OSC_PARAMS + OSC_MAP[n % 8]
            }
            88..=105 => {
                let n = nrpn - 88;
                FIRST_OSC_PARAM + (n / 6) * OSC_PARAMS + DCA_MAP[n % 6]
            }
            106..=131 => MISC_MAP[nrpn - 106],
            _ => return false,
        };
        self.set_u7_parameter(idx, val7)
    }

    /// Packs into the 102-byte bank layout.
    pub fn pack(&self) -> [u8; PROGRAM_PACKED_SIZE] {
        let mut d = [0u8; PROGRAM_PACKED_SIZE];
        d[..PROGRAM_NAME_LEN].copy_from_slice(&self.name);

        for (i, e) in self.envs.iter().enumerate() {
            let b = &mut d[6 + 10 * i..16 + 10 * i];
            b[0] = (e.l1 as u8 & 0x7f) << 1;
            b[1] = (e.l2 as u8 & 0x7f) << 1;
            b[2] = (e.l3 as u8 & 0x7f) << 1;
            b[3] = e.t1 & 0x3f;
            b[4] = e.t2 & 0x3f;
            b[5] = e.t3 & 0x3f;
            b[6] = (e.t4 & 0x3f) | (e.r2 as u8) << 7;
            b[7] = e.le as u8 | (e.lv & 0x3f) << 2;
            b[8] = e.t1v & 0x3f;
            b[9] = e.tk & 0x3f;
        }

        for (i, l) in self.lfos.iter().enumerate() {
            let b = &mut d[46 + 4 * i..50 + 4 * i];
            b[0] = (l.freq & 0x3f) | (l.wav & 3) << 6;
            b[1] = (l.l1 & 0x3f) | ((l.mod_src >> 2) & 3) << 6;
            b[2] = (l.l2 & 0x3f) | (l.mod_src & 3) << 6;
            b[3] = (l.delay & 0x3f) | (l.human as u8) << 6 | (l.reset as u8) << 7;
        }

        for (i, o) in self.oscs.iter().enumerate() {
            let b = &mut d[58 + 10 * i..68 + 10 * i];
            b[0] = o.octsemi & 0x7f;
            b[1] = (o.fine & 0x1f) << 3;
            b[2] = (o.fmsrc1 & 0xf) | (o.fmsrc2 & 0xf) << 4;
            b[3] = (o.fcmodamt1 as u8 & 0x7f) << 1;
            b[4] = (o.fcmodamt2 as u8 & 0x7f) << 1;
            b[5] = o.waveform;
            b[6] = (o.dcalevel & 0x3f) << 1 | (o.dcaenable as u8) << 7;
            b[7] = (o.amsrc1 & 0xf) | (o.amsrc2 & 0xf) << 4;
            b[8] = (o.amamt1 as u8 & 0x7f) << 1;
            b[9] = (o.amamt2 as u8 & 0x7f) << 1;
        }

        let m = &self.misc;
        let b = &mut d[88..102];
        b[0] = (m.dca4modamt & 0x3f) << 1 | (m.am as u8) << 7;
        b[1] = (m.fltfc & 0x7f) | (m.sync as u8) << 7;
        b[2] = m.q & 0x1f;
        b[3] = (m.fcsrc1 & 0xf) | (m.fcsrc2 & 0xf) << 4;
        b[4] = (m.fcmodamt1 as u8 & 0x7f) | (m.vc as u8) << 7;
        b[5] = (m.fcmodamt2 as u8 & 0x7f) | (m.mono as u8) << 7;
        b[6] = (m.keybd & 0x3f) << 1 | (m.env as u8) << 7;
        b[7] = (m.glide & 0x3f) | (m.osc as u8) << 7;
        b[8] = (m.splitpoint & 0x7f) | (m.splitdir as u8) << 7;
        b[9] = (m.layerprg & 0x7f) | (m.layer as u8) << 7;
        b[10] = (m.splitprg & 0x7f) | (m.split as u8) << 7;
        b[11] = (m.splitlayerprg & 0x7f) | (m.splitlayer as u8) << 7;
        b[12] = (m.panmodsrc & 0xf) | (m.pan & 0xf) << 4;
        b[13] = (m.panmodamt as u8 & 0x7f) | (m.cycle as u8) << 7;

        d
    }

    /// Decodes the 102-byte bank layout. The caller validates length.
    pub fn unpack(d: &[u8]) -> Program {
        assert_eq!(d.len(), PROGRAM_PACKED_SIZE);

        // sign extension for 7-bit fields
        fn s7_hi(b: u8) -> i8 {
            (b as i8) >> 1 // field in bits 1-7
        }
        fn s7_lo(b: u8) -> i8 {
            ((b << 1) as i8) >> 1 // field in bits 0-6
        }

        let mut name = [0u8; PROGRAM_NAME_LEN];
        name.copy_from_slice(&d[..PROGRAM_NAME_LEN]);

        let mut envs = [EnvParams::default(); ENV_COUNT];
        for (i, e) in envs.iter_mut().enumerate() {
            let b = &d[6 + 10 * i..16 + 10 * i];
            e.l1 = s7_hi(b[0]);
            e.l2 = s7_hi(b[1]);
            e.l3 = s7_hi(b[2]);
            e.t1 = b[3] & 0x3f;
            e.t2 = b[4] & 0x3f;
            e.t3 = b[5] & 0x3f;
            e.t4 = b[6] & 0x3f;
            e.r2 = b[6] & 0x80 != 0;
            e.le = b[7] & 1 != 0;
            e.lv = (b[7] >> 2) & 0x3f;
            e.t1v = b[8] & 0x3f;
            e.tk = b[9] & 0x3f;
        }

        let mut lfos = [LfoParams::default(); LFO_COUNT];
        for (i, l) in lfos.iter_mut().enumerate() {
            let b = &d[46 + 4 * i..50 + 4 * i];
            l.freq = b[0] & 0x3f;
            l.wav = b[0] >> 6;
            l.l1 = b[1] & 0x3f;
            l.l2 = b[2] & 0x3f;
            l.mod_src = (b[2] >> 6) | (b[1] >> 6) << 2;
            l.delay = b[3] & 0x3f;
            l.human = b[3] & 0x40 != 0;
            l.reset = b[3] & 0x80 != 0;
        }

        let mut oscs = [OscParams::default(); OSC_COUNT];
        for (i, o) in oscs.iter_mut().enumerate() {
            let b = &d[58 + 10 * i..68 + 10 * i];
            o.octsemi = b[0] & 0x7f;
            o.fine = b[1] >> 3;
            o.fmsrc1 = b[2] & 0xf;
            o.fmsrc2 = b[2] >> 4;
            o.fcmodamt1 = s7_hi(b[3]);
            o.fcmodamt2 = s7_hi(b[4]);
            o.waveform = b[5];
            o.dcalevel = (b[6] >> 1) & 0x3f;
            o.dcaenable = b[6] & 0x80 != 0;
            o.amsrc1 = b[7] & 0xf;
            o.amsrc2 = b[7] >> 4;
            o.amamt1 = s7_hi(b[8]);
            o.amamt2 = s7_hi(b[9]);
        }

        let b = &d[88..102];
        let misc = MiscParams {
            dca4modamt: (b[0] >> 1) & 0x3f,
            am: b[0] & 0x80 != 0,
            fltfc: b[1] & 0x7f,
            sync: b[1] & 0x80 != 0,
            q: b[2] & 0x1f,
            fcsrc1: b[3] & 0xf,
            fcsrc2: b[3] >> 4,
            fcmodamt1: s7_lo(b[4]),
            vc: b[4] & 0x80 != 0,
            fcmodamt2: s7_lo(b[5]),
            mono: b[5] & 0x80 != 0,
            keybd: (b[6] >> 1) & 0x3f,
            env: b[6] & 0x80 != 0,
            glide: b[7] & 0x3f,
            osc: b[7] & 0x80 != 0,
            splitpoint: b[8] & 0x7f,
            splitdir: b[8] & 0x80 != 0,
            layerprg: b[9] & 0x7f,
            layer: b[9] & 0x80 != 0,
            splitprg: b[10] & 0x7f,
            split: b[10] & 0x80 != 0,
            splitlayerprg: b[11] & 0x7f,
            splitlayer: b[11] & 0x80 != 0,
            panmodsrc: b[12] & 0xf,
            pan: b[12] >> 4,
            panmodamt: s7_lo(b[13]),
            cycle: b[13] & 0x80 != 0,
        };

        Program {
            name,
            envs,
            lfos,
            oscs,
            misc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_clamps_to_range() {
        let mut pgm = Program::init();
        for idx in 0..PARAM_COUNT {
            let (min, max) = Program::parameter_range(idx);
            pgm.set_parameter(idx, max + 1);
            assert_eq!(pgm.get_parameter(idx), max, "param {}", idx);
            pgm.set_parameter(idx, min - 1);
            assert_eq!(pgm.get_parameter(idx), min, "param {}", idx);
        }
    }

    #[test]
    fn set_reports_change() {
        let mut pgm = Program::init();
        pgm.set_parameter(116, 0);
        assert!(pgm.set_parameter(116, 64));
        assert!(!pgm.set_parameter(116, 64));
    }

    #[test]
    fn pack_unpack_roundtrip() {
        let mut pgm = Program::init();
        pgm.rename("TEST");
        pgm.envs[0].l1 = -33;
        pgm.envs[2].r2 = true;
        pgm.lfos[1].mod_src = 13;
        pgm.oscs[1].fcmodamt1 = -64;
        pgm.oscs[2].waveform = 200;
        pgm.misc.fcmodamt2 = -1;
        pgm.misc.pan = 15;
        pgm.misc.cycle = true;
        let packed = pgm.pack();
        assert_eq!(Program::unpack(&packed), pgm);
    }

    #[test]
    fn packed_layout_bytes() {
        let mut pgm = Program::init();
        pgm.envs[0].l1 = -1;
        pgm.misc.panmodsrc = 3;
        pgm.misc.pan = 9;
        pgm.misc.panmodamt = -2;
        pgm.misc.cycle = true;
        let d = pgm.pack();
        // 7-bit -1 in bits 1-7
        assert_eq!(d[6], 0xfe);
        // nibble pair
        assert_eq!(d[100], 3 | 9 << 4);
        // 7-bit -2 in bits 0-6, flag in bit 7
        assert_eq!(d[101], 0x7e | 0x80);
    }

    #[test]
    fn oct_semi_composite() {
        let mut pgm = Program::init();
        pgm.set_parameter(72, -3);
        pgm.set_parameter(73, 11);
        assert_eq!(pgm.get_parameter(72), -3);
        assert_eq!(pgm.get_parameter(73), 11);
        pgm.set_parameter(72, 5);
        assert_eq!(pgm.get_parameter(72), 5);
        assert_eq!(pgm.get_parameter(73), 11);
    }

    #[test]
    fn nrpn_mapping() {
        let mut pgm = Program::init();
        // 41 = Lfo1 RESET
        pgm.lfos[0].reset = false;
        assert!(pgm.apply_nrpn(41, 127));
        assert!(pgm.lfos[0].reset);
        // 67 = Osc1 WAVEFORM, full scale
        pgm.apply_nrpn(67, 127);
        assert_eq!(pgm.oscs[0].waveform, 255);
        // 107 = Misc PAN
        pgm.apply_nrpn(107, 0);
        assert_eq!(pgm.misc.pan, 0);
        // 131 = Misc SPLITPOINT
        pgm.apply_nrpn(131, 64);
        assert_eq!(pgm.misc.splitpoint, 64);
        assert!(!pgm.apply_nrpn(200, 1));
    }

    #[test]
    fn u7_scaling_covers_range() {
        let mut pgm = Program::init();
        // signed parameter: 0 maps to min, 127 to max
        pgm.set_u7_parameter(0, 0);
        assert_eq!(pgm.get_parameter(0), -64);
        pgm.set_u7_parameter(0, 127);
        assert_eq!(pgm.get_parameter(0), 63);
    }

    #[test]
    fn rename_truncates_and_pads() {
        let mut pgm = Program::init();
        assert!(pgm.rename("LONGNAME"));
        assert_eq!(&pgm.name, b"LONGNA");
        assert_eq!(pgm.name_str(), "LONGNA");
        assert!(pgm.rename("AB"));
        assert_eq!(&pgm.name, b"AB    ");
        assert!(!pgm.rename("AB"));
    }
}
