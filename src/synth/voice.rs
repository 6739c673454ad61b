//! One note of polyphony: the component chain and its modulation
//! buffers.
//!
//! Per block the voice first renders every modulation source into its
//! buffer, then runs the audio chain, reading modulation through the
//! routing fields of the program. Three sources (wheel, pedal and the
//! external controller) belong to the instrument and are shared by all
//! voices.

use crate::data::{ModSource, WaveBank, MOD_SOURCE_COUNT};
use crate::fixed::clamp_i32;
use crate::program::{Program, ENV_COUNT, LFO_COUNT, OSC_COUNT};
use crate::synth::dca::{Dca, Dca4};
use crate::synth::env::Env;
use crate::synth::lfo::Lfo;
use crate::synth::mod_buffer::ModBuffer;
use crate::synth::osc::Osc;
use crate::synth::sat::Sat;
use crate::synth::scratch::Scratch;
use crate::synth::vcf::Vcf;
use crate::tables::{RateTables, VEL_SQUARE};

/// Modulation buffers owned by the instrument and read by every voice.
#[derive(Debug)]
pub struct SharedMods {
    pub wheel: ModBuffer,
    pub pedal: ModBuffer,
    pub xctrl: ModBuffer,
}

impl SharedMods {
    pub fn new(capacity: usize) -> SharedMods {
        SharedMods {
            wheel: ModBuffer::new(capacity),
            pedal: ModBuffer::new(capacity),
            xctrl: ModBuffer::new(capacity),
        }
    }

    /// Completes the block so voices can read with `as_slice`.
    pub fn prepare(&mut self, nframes: usize) {
        self.wheel.repeat_upto(nframes - 1);
        self.pedal.repeat_upto(nframes - 1);
        self.xctrl.repeat_upto(nframes - 1);
    }

    pub fn cycle(&mut self) {
        self.wheel.cycle();
        self.pedal.cycle();
        self.xctrl.cycle();
    }

    pub fn clear(&mut self) {
        self.wheel.clear(0);
        self.pedal.clear(0);
        self.xctrl.clear(0);
    }
}

/// Resolves a routing field to a completed modulation block. The OFF
/// slot of the voice array is never written and stays zero.
fn mod_input<'a>(
    mods: &'a [ModBuffer],
    shared: &'a SharedMods,
    src: u8,
    nframes: usize,
) -> &'a [i8] {
    match ModSource::from_index(src) {
        ModSource::Wheel => shared.wheel.as_slice(nframes),
        ModSource::Pedal => shared.pedal.as_slice(nframes),
        ModSource::Xctrl => shared.xctrl.as_slice(nframes),
        other => mods[other.index() as usize].as_slice(nframes),
    }
}

#[derive(Debug)]
pub struct Voice {
    key: u8,
    vel: u8,
    mods: Vec<ModBuffer>,
    env: [Env; ENV_COUNT],
    lfo: [Lfo; LFO_COUNT],
    osc: [Osc; OSC_COUNT],
    dca: [Dca; OSC_COUNT],
    sat: Sat,
    vcf: Vcf,
    dca4: Dca4,
    program: Program,
}

impl Voice {
    pub fn new(capacity: usize, seed: u64) -> Voice {
        Voice {
            key: 0,
            vel: 0,
            mods: (0..MOD_SOURCE_COUNT)
                .map(|_| ModBuffer::new(capacity))
                .collect(),
            env: [Env::new(), Env::new(), Env::new(), Env::new()],
            lfo: [
                Lfo::new(seed),
                Lfo::new(seed.wrapping_add(1)),
                Lfo::new(seed.wrapping_add(2)),
            ],
            osc: [Osc::new(), Osc::new(), Osc::new()],
            dca: [Dca::new(), Dca::new(), Dca::new()],
            sat: Sat::new(),
            vcf: Vcf::new(),
            dca4: Dca4::new(),
            program: Program::init(),
        }
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn set_program(&mut self, program: &Program) {
        self.program = *program;
    }

    /// Idle once the amplitude envelope has run out.
    pub fn finished(&self) -> bool {
        !self.env[3].running()
    }

    pub fn reset(&mut self) {
        self.mods[ModSource::Press.index() as usize].clear(0);

        for lfo in self.lfo.iter_mut() {
            lfo.reset();
        }
        if self.program.misc.env {
            for env in self.env.iter_mut() {
                env.reset();
            }
        }
        if self.program.misc.osc {
            for osc in self.osc.iter_mut() {
                osc.reset();
            }
        }
        self.vcf.reset();
        self.sat.reset();
    }

    pub fn trigger(&mut self, key: u8, vel: u8, tables: &RateTables) {
        self.key = key;
        self.vel = vel;
        self.aftertouch(vel, 0);

        let Voice {
            ref mut env,
            ref mut lfo,
            ref program,
            ..
        } = *self;

        for (lfo, params) in lfo.iter_mut().zip(program.lfos.iter()) {
            if params.reset {
                lfo.reset();
            }
        }
        for (env, params) in env.iter_mut().zip(program.envs.iter()) {
            env.trigger(params, tables, vel);
        }
    }

    pub fn release(&mut self, vel: u8) {
        for env in self.env.iter_mut() {
            env.release(vel);
        }
    }

    pub fn aftertouch(&mut self, vel: u8, ftime: usize) {
        self.mods[ModSource::Press.index() as usize].append(ftime, (vel / 2) as i8);
    }

    /// Renders every modulation source for this block.
    pub fn synthesize_mods(&mut self, nframes: usize, tables: &RateTables) {
        let Voice {
            key,
            vel,
            ref mut mods,
            ref mut env,
            ref mut lfo,
            ref program,
            ..
        } = *self;

        mods[ModSource::Press.index() as usize].repeat_upto(nframes - 1);

        let kybd = (key / 2) as i8;
        let kybd2 = (clamp_i32((key as i32 - 36) * 126 / 60, 0, 126) - 63) as i8;
        let vel_half = (vel / 2) as i8;
        let vel2 = VEL_SQUARE[(vel as usize).min(126)];
        mods[ModSource::Kybd.index() as usize].fill_entire(kybd, nframes);
        mods[ModSource::Kybd2.index() as usize].fill_entire(kybd2, nframes);
        mods[ModSource::Vel.index() as usize].fill_entire(vel_half, nframes);
        mods[ModSource::Vel2.index() as usize].fill_entire(vel2, nframes);

        for (i, env) in env.iter_mut().enumerate() {
            let dst = ModSource::Env1.index() as usize + i;
            env.generate(mods[dst].for_output(nframes));
        }

        for (i, lfo) in lfo.iter_mut().enumerate() {
            let dst = ModSource::Lfo1.index() as usize + i;
            // the depth modulation input is not wired up yet
            lfo.generate(mods[dst].for_output(nframes), &[], &program.lfos[i], tables);
        }
    }

    /// Runs the audio chain and accumulates into the stereo bus.
    /// `synthesize_mods` must have completed this block first.
    pub fn synthesize_adding(
        &mut self,
        outl: &mut [i16],
        outr: &mut [i16],
        shared: &SharedMods,
        waves: &WaveBank,
        tables: &RateTables,
        scratch: &mut Scratch,
    ) {
        let nframes = outl.len();

        let zeros8 = scratch.take_i8(nframes);
        let zeros16 = scratch.take_i16(nframes);
        let mut syncout = scratch.take_i8(nframes);
        let mut dummy_sync = scratch.take_i8(nframes);
        let mut oscout = [
            scratch.take_i16(nframes),
            scratch.take_i16(nframes),
            scratch.take_i16(nframes),
        ];
        let mut dcaout = [
            scratch.take_i16(nframes),
            scratch.take_i16(nframes),
            scratch.take_i16(nframes),
        ];
        let mut satin = scratch.take_i32(nframes);
        let mut satout = scratch.take_i16(nframes);
        let mut vcfout = scratch.take_i16(nframes);

        {
            let Voice {
                key,
                ref mods,
                ref mut osc,
                ref mut dca,
                ref mut sat,
                ref mut vcf,
                ref mut dca4,
                ref program,
                ..
            } = *self;
            let misc = &program.misc;

            // oscillator 0 writes the sync track the others may read
            {
                let params = &program.oscs[0];
                let fm = [
                    mod_input(mods, shared, params.fmsrc1, nframes),
                    mod_input(mods, shared, params.fmsrc2, nframes),
                ];
                osc[0].generate(
                    &mut oscout[0],
                    &zeros8,
                    &mut syncout,
                    fm,
                    [params.fcmodamt1, params.fcmodamt2],
                    key,
                    params,
                    waves,
                    tables,
                );
            }
            for i in 1..OSC_COUNT {
                let params = &program.oscs[i];
                let fm = [
                    mod_input(mods, shared, params.fmsrc1, nframes),
                    mod_input(mods, shared, params.fmsrc2, nframes),
                ];
                let syncin: &[i8] = if i == 1 && misc.sync {
                    &syncout
                } else {
                    &zeros8
                };
                osc[i].generate(
                    &mut oscout[i],
                    syncin,
                    &mut dummy_sync,
                    fm,
                    [params.fcmodamt1, params.fcmodamt2],
                    key,
                    params,
                    waves,
                    tables,
                );
            }

            for i in 0..OSC_COUNT {
                let params = &program.oscs[i];
                let am = [
                    mod_input(mods, shared, params.amsrc1, nframes),
                    mod_input(mods, shared, params.amsrc2, nframes),
                ];
                let ampin: &[i16] = if i == 1 && misc.am { &oscout[0] } else { &zeros16 };
                dca[i].generate(
                    &mut dcaout[i],
                    &oscout[i],
                    ampin,
                    am,
                    [params.amamt1, params.amamt2],
                    params,
                );
            }

            for i in 0..nframes {
                satin[i] =
                    dcaout[0][i] as i32 + dcaout[1][i] as i32 + dcaout[2][i] as i32;
            }
            sat.generate(&satin, &mut satout);

            let fcm = [
                mod_input(mods, shared, misc.fcsrc1, nframes),
                mod_input(mods, shared, misc.fcsrc2, nframes),
            ];
            vcf.generate(
                &mut vcfout,
                &satout,
                fcm,
                [misc.fcmodamt1, misc.fcmodamt2],
                key,
                misc,
                tables,
            );

            let envp = mods[ModSource::Env4.index() as usize].as_slice(nframes);
            let panmod = mod_input(mods, shared, misc.panmodsrc, nframes);
            dca4.generate_adding(outl, outr, &vcfout, envp, panmod, misc);
        }

        scratch.give_i16(vcfout);
        scratch.give_i16(satout);
        scratch.give_i32(satin);
        let [a, b, c] = dcaout;
        scratch.give_i16(c);
        scratch.give_i16(b);
        scratch.give_i16(a);
        let [a, b, c] = oscout;
        scratch.give_i16(c);
        scratch.give_i16(b);
        scratch.give_i16(a);
        scratch.give_i8(dummy_sync);
        scratch.give_i8(syncout);
        scratch.give_i16(zeros16);
        scratch.give_i8(zeros8);

        // ready for the next round of control events
        self.mods[ModSource::Press.index() as usize].cycle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BLOCK_FRAMES;

    struct Rig {
        shared: SharedMods,
        waves: WaveBank,
        tables: RateTables,
        scratch: Scratch,
    }

    impl Rig {
        fn new() -> Rig {
            Rig {
                shared: SharedMods::new(BLOCK_FRAMES),
                waves: WaveBank::builtin(),
                tables: RateTables::new(48000.0),
                scratch: Scratch::new(),
            }
        }

        fn render(&mut self, voice: &mut Voice) -> (Vec<i16>, Vec<i16>) {
            let n = BLOCK_FRAMES;
            self.shared.prepare(n);
            voice.synthesize_mods(n, &self.tables);
            let mut outl = vec![0i16; n];
            let mut outr = vec![0i16; n];
            voice.synthesize_adding(
                &mut outl,
                &mut outr,
                &self.shared,
                &self.waves,
                &self.tables,
                &mut self.scratch,
            );
            self.shared.cycle();
            (outl, outr)
        }
    }

    #[test]
    fn triggered_voice_makes_sound() {
        let mut rig = Rig::new();
        let mut voice = Voice::new(BLOCK_FRAMES, 1);
        voice.trigger(60, 100, &rig.tables);

        let mut peak = 0i32;
        for _ in 0..32 {
            let (outl, _) = rig.render(&mut voice);
            peak = peak.max(outl.iter().map(|&v| (v as i32).abs()).max().unwrap());
        }
        assert!(peak > 500, "peak = {}", peak);
        assert!(rig.scratch.is_empty());
    }

    #[test]
    fn release_finishes_the_voice() {
        let mut rig = Rig::new();
        let mut voice = Voice::new(BLOCK_FRAMES, 1);
        voice.trigger(60, 100, &rig.tables);
        rig.render(&mut voice);
        assert!(!voice.finished());

        voice.release(0);
        for _ in 0..200 {
            if voice.finished() {
                break;
            }
            rig.render(&mut voice);
        }
        assert!(voice.finished());
    }

    #[test]
    fn silent_program_stays_silent() {
        let mut rig = Rig::new();
        let mut voice = Voice::new(BLOCK_FRAMES, 1);
        let mut program = Program::init();
        for osc in program.oscs.iter_mut() {
            osc.dcaenable = false;
        }
        voice.set_program(&program);
        voice.trigger(60, 100, &rig.tables);

        for _ in 0..8 {
            let (outl, outr) = rig.render(&mut voice);
            assert!(outl.iter().all(|&v| v == 0));
            assert!(outr.iter().all(|&v| v == 0));
        }
    }
}
