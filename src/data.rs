//! Modulation source and wave data definitions.
//!
//! The hardware reads wavesets and samples out of ROM; here a built-in
//! bank of synthesized single-cycle waves provides the same indirection:
//! a waveset maps 16 key zones to wave numbers, a wave points at sample
//! data with a power-of-two length.

use serde::{Deserialize, Serialize};

/// A modulation source selectable by the routing parameters.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModSource {
    Lfo1,
    Lfo2,
    Lfo3,
    Env1,
    Env2,
    Env3,
    Env4,
    Vel,
    Vel2,
    Kybd,
    Kybd2,
    Wheel,
    Pedal,
    Xctrl,
    Press,
    Off,
}

impl ModSource {
    /// Decodes a 4-bit routing field. Values past the last source read
    /// as OFF.
    pub fn from_index(idx: u8) -> ModSource {
        match idx {
            0 => ModSource::Lfo1,
            1 => ModSource::Lfo2,
            2 => ModSource::Lfo3,
            3 => ModSource::Env1,
            4 => ModSource::Env2,
            5 => ModSource::Env3,
            6 => ModSource::Env4,
            7 => ModSource::Vel,
            8 => ModSource::Vel2,
            9 => ModSource::Kybd,
            10 => ModSource::Kybd2,
            11 => ModSource::Wheel,
            12 => ModSource::Pedal,
            13 => ModSource::Xctrl,
            14 => ModSource::Press,
            _ => ModSource::Off,
        }
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ModSource::Lfo1 => "LFO1",
            ModSource::Lfo2 => "LFO2",
            ModSource::Lfo3 => "LFO3",
            ModSource::Env1 => "ENV1",
            ModSource::Env2 => "ENV2",
            ModSource::Env3 => "ENV3",
            ModSource::Env4 => "ENV4",
            ModSource::Vel => "VEL",
            ModSource::Vel2 => "VEL2",
            ModSource::Kybd => "KYBD",
            ModSource::Kybd2 => "KYBD2",
            ModSource::Wheel => "WHEEL",
            ModSource::Pedal => "PEDAL",
            ModSource::Xctrl => "XCTRL",
            ModSource::Press => "PRESS",
            ModSource::Off => "OFF",
        }
    }
}

/// Number of selectable modulation sources, OFF included.
pub const MOD_SOURCE_COUNT: usize = 16;

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub enum LfoWave {
    Tri,
    Saw,
    Sqr,
    Noi,
}

impl LfoWave {
    pub fn from_index(idx: u8) -> LfoWave {
        match idx & 3 {
            0 => LfoWave::Tri,
            1 => LfoWave::Saw,
            2 => LfoWave::Sqr,
            _ => LfoWave::Noi,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LfoWave::Tri => "TRI",
            LfoWave::Saw => "SAW",
            LfoWave::Sqr => "SQR",
            LfoWave::Noi => "NOI",
        }
    }
}

/// One single-cycle wave. Samples are unsigned 8-bit, length is a power
/// of two so the oscillator phase maps to an index by shifting.
#[derive(Clone, Debug)]
pub struct Wave {
    pub name: &'static str,
    pub log2length: u32,
    pub data: Vec<u8>,
}

/// Maps the 16 key zones of the keyboard to wave numbers.
#[derive(Clone, Debug)]
pub struct Waveset {
    pub name: &'static str,
    pub wavenum: [u8; 16],
}

/// Borrowed view of a wave's sample data for the oscillator inner loop.
#[derive(Copy, Clone)]
pub struct SampleRef<'a> {
    pub data: &'a [u8],
    pub log2length: u32,
}

/// The built-in wave bank.
pub struct WaveBank {
    waves: Vec<Wave>,
    wavesets: Vec<Waveset>,
}

const WAVE_CYCLE_LEN: usize = 256;
const WAVE_LOG2LEN: u32 = 8;

impl WaveBank {
    pub fn builtin() -> WaveBank {
        let specs: [(&'static str, fn(f64) -> f64); 8] = [
            ("saw", wave_saw),
            ("square", wave_square),
            ("pulse.1", wave_pulse25),
            ("pulse.2", wave_pulse10),
            ("sine", wave_sine),
            ("triang", wave_triangle),
            ("bell.1", wave_bell),
            ("organ.1", wave_organ),
        ];

        let mut waves = Vec::with_capacity(specs.len());
        for &(name, f) in specs.iter() {
            let mut data = Vec::with_capacity(WAVE_CYCLE_LEN);
            for i in 0..WAVE_CYCLE_LEN {
                let t = i as f64 / WAVE_CYCLE_LEN as f64;
                let v = f(t).max(-1.0).min(1.0);
                data.push(((v * 0.5 + 0.5) * 255.0).round() as u8);
            }
            waves.push(Wave {
                name,
                log2length: WAVE_LOG2LEN,
                data,
            });
        }

        // Flat wavesets, one wave across all key zones.
        let wavesets = waves
            .iter()
            .enumerate()
            .map(|(i, w)| Waveset {
                name: w.name,
                wavenum: [i as u8; 16],
            })
            .collect();

        WaveBank { waves, wavesets }
    }

    pub fn waveset_count(&self) -> usize {
        self.wavesets.len()
    }

    pub fn wave_count(&self) -> usize {
        self.waves.len()
    }

    pub fn waveset(&self, id: u8) -> &Waveset {
        &self.wavesets[id as usize % self.wavesets.len()]
    }

    pub fn waveset_by_name(&self, name: &str) -> Option<u8> {
        self.wavesets
            .iter()
            .position(|ws| ws.name == name)
            .map(|i| i as u8)
    }

    pub fn wave(&self, id: u8) -> &Wave {
        &self.waves[id as usize % self.waves.len()]
    }

    /// Resolves the sample the oscillator should play for a WAVEFORM
    /// parameter value at a given key.
    pub fn sample_for(&self, waveform: u8, key: u8) -> SampleRef<'_> {
        let zone = 16 * key.min(127) as usize / 128;
        let wavenum = self.waveset(waveform).wavenum[zone];
        let wave = self.wave(wavenum);
        SampleRef {
            data: &wave.data,
            log2length: wave.log2length,
        }
    }
}

fn wave_saw(t: f64) -> f64 {
    2.0 * t - 1.0
}

fn wave_square(t: f64) -> f64 {
    if t < 0.5 {
        1.0
    } else {
        -1.0
    }
}

fn wave_pulse25(t: f64) -> f64 {
    if t < 0.25 {
        1.0
    } else {
        -1.0
    }
}

fn wave_pulse10(t: f64) -> f64 {
    if t < 0.1 {
        1.0
    } else {
        -1.0
    }
}

fn wave_sine(t: f64) -> f64 {
    (2.0 * std::f64::consts::PI * t).sin()
}

fn wave_triangle(t: f64) -> f64 {
    if t < 0.25 {
        4.0 * t
    } else if t < 0.75 {
        2.0 - 4.0 * t
    } else {
        4.0 * t - 4.0
    }
}

fn wave_bell(t: f64) -> f64 {
    let w = 2.0 * std::f64::consts::PI * t;
    0.6 * w.sin() + 0.3 * (4.0 * w).sin() + 0.1 * (6.7 * w).sin()
}

fn wave_organ(t: f64) -> f64 {
    let w = 2.0 * std::f64::consts::PI * t;
    0.5 * w.sin() + 0.3 * (2.0 * w).sin() + 0.2 * (4.0 * w).sin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mod_source_index_roundtrip() {
        for i in 0..16u8 {
            assert_eq!(ModSource::from_index(i).index(), i);
        }
        assert_eq!(ModSource::from_index(200), ModSource::Off);
    }

    #[test]
    fn builtin_bank_lookup() {
        let bank = WaveBank::builtin();
        assert!(bank.waveset_count() > 0);
        // WAVEFORM values past the end wrap instead of panicking
        let s = bank.sample_for(255, 127);
        assert_eq!(s.data.len(), 1 << s.log2length);
    }

    #[test]
    fn waves_cover_full_range() {
        let bank = WaveBank::builtin();
        let saw = bank.wave(bank.waveset_by_name("saw").unwrap());
        assert_eq!(*saw.data.first().unwrap(), 0);
        assert_eq!(*saw.data.last().unwrap(), 254);
    }
}
