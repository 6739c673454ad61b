//! The full polyphonic instrument: voice management, MIDI dispatch,
//! bank memory and the editor protocol.
//!
//! Voices are kept in a recency-ordered list. Retriggering a held key
//! reuses its voice; a new note takes the first free slot or steals
//! the least recently used one. Voices released into their tail keep
//! whatever program they were triggered with, so an edit never clicks
//! through a ringing note.

use log::{debug, info, trace};

use crate::bank::Bank;
use crate::data::WaveBank;
use crate::messages::{Notification, NotificationSink, Request};
use crate::program::Program;
use crate::synth::scratch::Scratch;
use crate::synth::voice::{SharedMods, Voice};
use crate::tables::RateTables;
use crate::BLOCK_MAX;

pub const POLY_MAX: usize = 16;
pub const BANK_COUNT: usize = 4;

const DEFAULT_POLY: usize = 8;
const DEFAULT_XCTRL: u8 = 2; // breath controller

/// Which kind of MIDI pressure feeds the PRESS source.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PressureType {
    Channel,
    Key,
}

pub struct Instrument {
    sink: Box<dyn NotificationSink + Send>,
    tables: RateTables,
    waves: WaveBank,
    scratch: Scratch,

    poly: usize,
    /// MIDI channel 0..15; anything higher listens on all channels.
    midichan: u8,
    /// Pending NRPN (<128) or RPN (>=128) number.
    nrpn: u16,
    xctrl: u8,
    ptype: PressureType,

    shared: SharedMods,

    program: Program,
    bank_notification_mask: u8,
    should_notify_program: bool,
    should_notify_write: bool,

    voices: Vec<Voice>,
    /// Active voice numbers, most recent first.
    vcorder: Vec<u8>,
    vcallocd: [bool; POLY_MAX],
    /// Set while a voice still plays a program other than the active
    /// one.
    vcforeign: [bool; POLY_MAX],

    banks: Vec<Bank>,
    banknum: usize,
    prognum: usize,
}

impl Instrument {
    pub fn new(sample_rate: f32, sink: Box<dyn NotificationSink + Send>) -> Instrument {
        let mut ins = Instrument {
            sink,
            tables: RateTables::new(sample_rate),
            waves: WaveBank::builtin(),
            scratch: Scratch::new(),
            poly: DEFAULT_POLY,
            midichan: 0,
            nrpn: 0,
            xctrl: DEFAULT_XCTRL,
            ptype: PressureType::Key,
            shared: SharedMods::new(BLOCK_MAX),
            program: Program::init(),
            bank_notification_mask: (1 << BANK_COUNT) - 1,
            should_notify_program: true,
            should_notify_write: false,
            voices: (0..POLY_MAX)
                .map(|i| Voice::new(BLOCK_MAX, i as u64))
                .collect(),
            vcorder: Vec::with_capacity(POLY_MAX),
            vcallocd: [false; POLY_MAX],
            vcforeign: [false; POLY_MAX],
            banks: vec![Bank::new(); BANK_COUNT],
            banknum: 0,
            prognum: 0,
        };
        ins.load_default_banks();
        let initial = *ins.selected_program();
        ins.enable_program(&initial);
        ins
    }

    pub fn select_midi_channel(&mut self, chan: u8) {
        self.midichan = chan;
    }

    pub fn select_xctrl(&mut self, ctl: u8) {
        self.xctrl = ctl;
        self.shared.xctrl.clear(0);
    }

    pub fn select_ptype(&mut self, ptype: PressureType) {
        self.ptype = ptype;
    }

    pub fn active_program(&self) -> &Program {
        &self.program
    }

    pub fn selected_program(&self) -> &Program {
        self.banks[self.banknum].program(self.prognum)
    }

    pub fn bank_number(&self) -> usize {
        self.banknum
    }

    pub fn program_number(&self) -> usize {
        self.prognum
    }

    pub fn active_voices(&self) -> usize {
        self.vcorder.len()
    }

    fn load_default_banks(&mut self) {
        for bank in self.banks.iter_mut() {
            *bank = Bank::new();
            for i in 0..crate::bank::BANK_MAX_PROGRAMS {
                bank.program_mut(i).rename("------");
            }
        }
        self.banks[0].program_mut(0).rename("INIT");
        self.banks[0].set_count(1);
        self.bank_notification_mask = (1 << BANK_COUNT) - 1;
    }

    pub fn load_bank(&mut self, index: usize, bank: &Bank) {
        self.banks[index] = bank.clone();
        self.bank_notification_mask |= 1 << index;
    }

    pub fn select_program(&mut self, banknum: usize, prognum: usize) {
        if banknum == self.banknum && prognum == self.prognum {
            return;
        }
        info!("select program {}:{}", banknum, prognum);

        let pgm = *self.banks[banknum].program(prognum);
        self.enable_program(&pgm);
        let bank = &mut self.banks[banknum];
        bank.set_count(bank.count().max(prognum + 1));
        self.banknum = banknum;
        self.prognum = prognum;
    }

    /// Makes a program the active one. Voices already sounding keep
    /// the old program until retriggered.
    pub fn enable_program(&mut self, pgm: &Program) {
        self.program = *pgm;
        self.vcforeign = [true; POLY_MAX];
        self.should_notify_program = true;
    }

    pub fn get_parameter(&self, idx: usize) -> i32 {
        self.program.get_parameter(idx)
    }

    pub fn set_parameter(&mut self, idx: usize, val: i32) {
        if self.program.set_parameter(idx, val) {
            self.should_notify_program = true;
        }
    }

    pub fn set_u7_parameter(&mut self, idx: usize, val7: i32) {
        if self.program.set_u7_parameter(idx, val7) {
            self.should_notify_program = true;
        }
    }

    pub fn rename_program(&mut self, name: &str) {
        if self.program.rename(name) {
            self.should_notify_program = true;
        }
    }

    pub fn reset(&mut self) {
        for i in 0..self.vcorder.len() {
            let vnum = self.vcorder[i] as usize;
            self.voices[vnum].reset();
            self.vcallocd[vnum] = false;
        }
        self.vcorder.clear();

        self.shared.clear();

        self.load_default_banks();
        self.banknum = 0;
        self.prognum = 0;
        let pgm = *self.selected_program();
        self.enable_program(&pgm);
    }

    //
    // rendering
    //

    pub fn synthesize(&mut self, outl: &mut [i16], outr: &mut [i16]) {
        let nframes = outl.len();

        self.emit_notifications();

        self.synthesize_mods(nframes);

        for v in outl.iter_mut() {
            *v = 0;
        }
        for v in outr.iter_mut() {
            *v = 0;
        }

        for i in 0..self.vcorder.len() {
            let vnum = self.vcorder[i] as usize;
            self.voices[vnum].synthesize_adding(
                outl,
                outr,
                &self.shared,
                &self.waves,
                &self.tables,
                &mut self.scratch,
            );
        }

        self.shutdown_idle_voices();

        // ready for the next round of control events
        self.shared.cycle();

        debug_assert!(self.scratch.is_empty());
    }

    fn synthesize_mods(&mut self, nframes: usize) {
        self.shared.prepare(nframes);

        for i in 0..self.vcorder.len() {
            let vnum = self.vcorder[i] as usize;
            self.voices[vnum].synthesize_mods(nframes, &self.tables);
        }
    }

    //
    // voice management
    //

    fn find_voice(&self, key: u8) -> Option<usize> {
        self.vcorder
            .iter()
            .map(|&v| v as usize)
            .find(|&v| {
                self.voices[v].key() == key && self.vcallocd[v] && !self.vcforeign[v]
            })
    }

    /// Every allocated voice on `key`, foreign ones included. Returned
    /// in a fixed array so the audio path stays allocation free.
    fn find_all_voices(&self, key: u8) -> ([u8; POLY_MAX], usize) {
        let mut found = [0u8; POLY_MAX];
        let mut count = 0;
        for &v in self.vcorder.iter() {
            if self.voices[v as usize].key() == key && self.vcallocd[v as usize] {
                found[count] = v;
                count += 1;
            }
        }
        (found, count)
    }

    fn allocate_voice(&mut self) -> Option<usize> {
        let poly = if self.program.misc.mono { 1 } else { self.poly };

        let mut vnum = None;
        let mut count = 0;
        for p in 0..POLY_MAX {
            if vnum.is_some() || count >= poly {
                break;
            }
            if self.vcallocd[p] {
                count += 1;
            } else {
                vnum = Some(p);
            }
        }

        if let Some(v) = vnum {
            trace!("allocate voice {}", v);
            self.vcallocd[v] = true;
            self.vcorder.insert(0, v as u8);
            return Some(v);
        }
        if let Some(v) = self.vcorder.pop() {
            trace!("steal voice {}", v);
            self.vcorder.insert(0, v);
            return Some(v as usize);
        }
        None
    }

    fn reorder_voice_first(&mut self, vnum: usize) {
        self.vcorder.retain(|&v| v as usize != vnum);
        self.vcorder.insert(0, vnum as u8);
    }

    fn shutdown_idle_voices(&mut self) {
        let voices = &self.voices;
        let vcallocd = &mut self.vcallocd;
        self.vcorder.retain(|&v| {
            if voices[v as usize].finished() {
                trace!("shutdown voice {}", v);
                vcallocd[v as usize] = false;
                false
            } else {
                true
            }
        });
    }

    //
    // editor protocol
    //

    pub fn receive_request(&mut self, req: Request) {
        match req {
            Request::SetProgram { prog } => {
                if (prog as usize) < crate::bank::BANK_MAX_PROGRAMS {
                    self.select_program(self.banknum, prog as usize);
                }
            }
            Request::SetBank { bank } => {
                if (bank as usize) < BANK_COUNT {
                    self.select_program(bank as usize, self.prognum);
                }
            }
            Request::LoadBank { data } => {
                let count = data.count();
                if count >= crate::bank::BANK_MAX_PROGRAMS {
                    return;
                }
                info!("load bank of {} programs into bank {}", count, self.banknum);
                let currbank = &mut self.banks[self.banknum];
                for i in 0..crate::bank::BANK_MAX_PROGRAMS {
                    *currbank.program_mut(i) = if i < count {
                        *data.program(i)
                    } else {
                        Program::init()
                    };
                }
                currbank.set_count(count);
                self.bank_notification_mask |= 1 << self.banknum;
                let pgm = *self.banks[self.banknum].program(self.prognum);
                self.enable_program(&pgm);
            }
            Request::RenameProgram { name } => {
                self.program.name = name;
                self.should_notify_program = true;
            }
            Request::InitProgram => {
                self.enable_program(&Program::init());
            }
            Request::WriteProgram => {
                info!("write program to {}:{}", self.banknum, self.prognum);
                *self.banks[self.banknum].program_mut(self.prognum) = self.program;
                self.should_notify_write = true;
            }
            Request::SetParameter { index, value } => {
                self.set_parameter(index as usize, value);
            }
            Request::GetBankData { bank } => {
                if (bank as usize) < BANK_COUNT {
                    self.bank_notification_mask |= 1 << bank;
                }
            }
            Request::NoteOn { key, velocity } => {
                self.handle_noteon(key, velocity, 0);
            }
            Request::NoteOff { key, velocity } => {
                self.handle_noteoff(key, velocity, 0);
            }
        }
    }

    fn emit_notifications(&mut self) {
        if self.should_notify_write {
            if self.sink.emit_notification(Notification::Write) {
                self.should_notify_write = false;
            }
        }

        if self.should_notify_program {
            let ntf = Notification::Program {
                bank: self.banknum as u32,
                prog: self.prognum as u32,
                data: Box::new(self.program),
            };
            if self.sink.emit_notification(ntf) {
                self.should_notify_program = false;
            }
        }

        if self.bank_notification_mask != 0 {
            // one bank per block, lowest number first
            let num = self.bank_notification_mask.trailing_zeros() as usize;
            if num < BANK_COUNT {
                let ntf = Notification::Bank {
                    num: num as u32,
                    data: Box::new(self.banks[num].clone()),
                };
                if self.sink.emit_notification(ntf) {
                    self.bank_notification_mask &= !(1 << num);
                }
            }
        }
    }

    //
    // MIDI
    //

    pub fn receive_midi(&mut self, msg: &[u8], ftime: usize) {
        let (status, data1, data2) = match msg.len() {
            0 => return,
            1 => (msg[0], 0, 0),
            2 => (msg[0], msg[1], 0),
            3 => (msg[0], msg[1], msg[2]),
            _ => return, // sysex and longer messages are not handled
        };

        if status & 0xf0 == 0xf0 {
            return; // system message
        }

        let chan = status & 15;
        if self.midichan < 16 && chan != self.midichan {
            return;
        }

        let data1 = data1 & 127;
        let data2 = data2 & 127;

        let mut event = status >> 4;
        // note-on with zero velocity acts as note-off
        if event == 0b1001 && data2 == 0 {
            event = 0b1000;
        }

        match event {
            0b1000 => self.handle_noteoff(data1, data2, ftime),
            0b1001 => self.handle_noteon(data1, data2, ftime),
            0b1010 => self.handle_key_pressure(data1, data2, ftime),
            0b1011 => self.handle_cc(data1, data2, ftime),
            0b1100 => self.handle_progchange(data1),
            0b1101 => self.handle_channel_pressure(data1, ftime),
            0b1110 => {
                // TODO route pitch bend into the oscillator pitch path
            }
            _ => {}
        }
    }

    fn handle_noteon(&mut self, key: u8, vel: u8, _ftime: usize) {
        trace!("note-on key={} vel={}", key, vel);

        if let Some(vnum) = self.find_voice(key) {
            self.reorder_voice_first(vnum);
            self.voices[vnum].trigger(key, vel, &self.tables);
        } else if let Some(vnum) = self.allocate_voice() {
            self.vcforeign[vnum] = false;
            let program = self.program;
            let voice = &mut self.voices[vnum];
            voice.set_program(&program);
            voice.reset();
            voice.trigger(key, vel, &self.tables);
        }
    }

    fn handle_noteoff(&mut self, key: u8, vel: u8, _ftime: usize) {
        trace!("note-off key={} vel={}", key, vel);

        let (found, count) = self.find_all_voices(key);
        for &vnum in &found[..count] {
            self.voices[vnum as usize].release(vel);
        }
    }

    fn handle_key_pressure(&mut self, key: u8, vel: u8, ftime: usize) {
        if self.ptype == PressureType::Key {
            if let Some(vnum) = self.find_voice(key) {
                self.voices[vnum].aftertouch(vel, ftime);
            }
        }
    }

    fn handle_channel_pressure(&mut self, vel: u8, ftime: usize) {
        if self.ptype == PressureType::Channel {
            for i in 0..self.vcorder.len() {
                let vnum = self.vcorder[i] as usize;
                self.voices[vnum].aftertouch(vel, ftime);
            }
        }
    }

    fn handle_cc(&mut self, ctl: u8, val: u8, ftime: usize) {
        if ctl == self.xctrl {
            self.shared.xctrl.append(ftime, (val / 2) as i8);
        }

        match ctl {
            1 => self.shared.wheel.append(ftime, (val / 2) as i8),
            4 => self.shared.pedal.append(ftime, (val / 2) as i8),

            6 => {
                // data entry applies the pending NRPN
                if self.nrpn < 128 {
                    if self.program.apply_nrpn(self.nrpn as usize, val as i32) {
                        self.should_notify_program = true;
                    }
                }
            }
            98 => self.nrpn = val as u16,
            100 => self.nrpn = 128 + val as u16,

            _ => {}
        }
    }

    fn handle_progchange(&mut self, num: u8) {
        debug!("program change {}", num);
        self.select_program(self.banknum, num as usize);
    }
}
