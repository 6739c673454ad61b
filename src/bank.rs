//! Program bank storage and the three bank encodings: raw binary,
//! sysex dump, and JSON.

use failure::Fail;
use log::info;
use serde::{Deserialize, Serialize};

use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;
use std::path::Path;

use crate::program::{Program, PROGRAM_PACKED_SIZE};

pub const BANK_MAX_PROGRAMS: usize = 128;

const SYSEX_HEADER: [u8; 5] = [0xf0, 0x0f, 0x02, 0x00, 0x02];
const SYSEX_EOX: u8 = 0xf7;

#[derive(Debug, Fail, PartialEq)]
pub enum BankError {
    #[fail(display = "cannot load bank: invalid length")]
    InvalidLength,
    #[fail(display = "cannot load bank: invalid sysex format")]
    InvalidSysex,
    #[fail(display = "cannot load bank: invalid program count")]
    InvalidProgramCount,
    #[fail(display = "cannot load bank: invalid text format")]
    InvalidText,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BankFormat {
    Binary,
    Sysex,
    Json,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Bank {
    count: u8,
    programs: Vec<Program>,
}

impl Default for Bank {
    fn default() -> Self {
        Bank::new()
    }
}

impl Bank {
    /// An empty bank: all slots hold the init program.
    pub fn new() -> Bank {
        Bank {
            count: 0,
            programs: vec![Program::init(); BANK_MAX_PROGRAMS],
        }
    }

    pub fn count(&self) -> usize {
        self.count as usize
    }

    pub fn set_count(&mut self, count: usize) {
        self.count = count.min(BANK_MAX_PROGRAMS) as u8;
    }

    pub fn program(&self, idx: usize) -> &Program {
        &self.programs[idx]
    }

    pub fn program_mut(&mut self, idx: usize) -> &mut Program {
        &mut self.programs[idx]
    }

    /// Decodes a raw binary dump of consecutive packed programs.
    /// Slots past the dump are padded with the init program.
    pub fn load(data: &[u8]) -> Result<Bank, BankError> {
        let count = data.len() / PROGRAM_PACKED_SIZE;
        if count > BANK_MAX_PROGRAMS {
            return Err(BankError::InvalidProgramCount);
        }

        let mut bank = Bank::new();
        bank.count = count as u8;
        for i in 0..count {
            let chunk = &data[i * PROGRAM_PACKED_SIZE..(i + 1) * PROGRAM_PACKED_SIZE];
            bank.programs[i] = Program::unpack(chunk);
        }
        Ok(bank)
    }

    /// Decodes a sysex bank dump. The payload carries each program
    /// byte as two data bytes, low nibble first, terminated by EOX.
    pub fn load_sysex(data: &[u8]) -> Result<Bank, BankError> {
        let end = data
            .iter()
            .position(|&b| b == SYSEX_EOX)
            .ok_or(BankError::InvalidSysex)?;
        let data = &data[..end];

        if data.len() < SYSEX_HEADER.len() {
            return Err(BankError::InvalidLength);
        }
        if data[..SYSEX_HEADER.len()] != SYSEX_HEADER {
            return Err(BankError::InvalidSysex);
        }
        let payload = &data[SYSEX_HEADER.len()..];

        let count = payload.len() / (2 * PROGRAM_PACKED_SIZE);
        if count > BANK_MAX_PROGRAMS {
            return Err(BankError::InvalidProgramCount);
        }

        let mut bank = Bank::new();
        bank.count = count as u8;
        for i in 0..count {
            let nibbles = &payload[i * 2 * PROGRAM_PACKED_SIZE..];
            let mut packed = [0u8; PROGRAM_PACKED_SIZE];
            for (j, byte) in packed.iter_mut().enumerate() {
                *byte = (nibbles[2 * j] & 0xf) | (nibbles[2 * j + 1] & 0xf) << 4;
            }
            bank.programs[i] = Program::unpack(&packed);
        }
        Ok(bank)
    }

    pub fn save_sysex(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            SYSEX_HEADER.len() + self.count() * 2 * PROGRAM_PACKED_SIZE + 1,
        );
        out.extend_from_slice(&SYSEX_HEADER);
        for pgm in &self.programs[..self.count()] {
            for byte in pgm.pack().iter() {
                out.push(byte & 0x0f);
                out.push((byte & 0xf0) >> 4);
            }
        }
        out.push(SYSEX_EOX);
        out
    }

    pub fn load_json(text: &str) -> Result<Bank, BankError> {
        let mut bank: Bank = serde_json::from_str(text).map_err(|_| BankError::InvalidText)?;
        if bank.programs.len() > BANK_MAX_PROGRAMS || (bank.count as usize) > bank.programs.len() {
            return Err(BankError::InvalidProgramCount);
        }
        bank.programs.resize(BANK_MAX_PROGRAMS, Program::init());
        Ok(bank)
    }

    pub fn save_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("bank serialization cannot fail")
    }

    /// Decodes bytes, picking the format by content: a sysex dump
    /// starts with the header byte, JSON with printable text, anything
    /// else reads as raw binary.
    pub fn load_detect(data: &[u8]) -> Result<Bank, BankError> {
        match data.first() {
            Some(&0xf0) => Bank::load_sysex(data),
            Some(&b'{') => {
                let text = std::str::from_utf8(data).map_err(|_| BankError::InvalidText)?;
                Bank::load_json(text)
            }
            _ => Bank::load(data),
        }
    }

    pub fn load_file(path: &Path) -> Result<Bank, failure::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let bank = Bank::load_detect(&data)?;
        info!("loaded bank from {} ({} programs)", path.display(), bank.count());
        Ok(bank)
    }

    pub fn save_file(&self, path: &Path, format: BankFormat) -> Result<(), failure::Error> {
        let mut file = File::create(path)?;
        match format {
            BankFormat::Binary => {
                for pgm in &self.programs[..self.count()] {
                    file.write_all(&pgm.pack())?;
                }
            }
            BankFormat::Sysex => file.write_all(&self.save_sysex())?,
            BankFormat::Json => file.write_all(self.save_json().as_bytes())?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bank() -> Bank {
        let mut bank = Bank::new();
        bank.set_count(3);
        bank.program_mut(0).rename("ALPHA");
        bank.program_mut(1).rename("BETA");
        bank.program_mut(1).envs[0].l1 = -12;
        bank.program_mut(2).misc.pan = 1;
        bank
    }

    #[test]
    fn sysex_roundtrip() {
        let bank = sample_bank();
        let bytes = bank.save_sysex();
        let again = Bank::load_sysex(&bytes).unwrap();
        assert_eq!(again, bank);
        // byte-identical after re-encoding
        assert_eq!(again.save_sysex(), bytes);
    }

    #[test]
    fn sysex_rejects_bad_input() {
        assert_eq!(Bank::load_sysex(&[0xf0, 0x0f]), Err(BankError::InvalidSysex));
        assert_eq!(
            Bank::load_sysex(&[0xf0, 0x0f, 0xf7]),
            Err(BankError::InvalidLength)
        );
        assert_eq!(
            Bank::load_sysex(&[0xf0, 0x0f, 0x02, 0x00, 0x03, 0xf7]),
            Err(BankError::InvalidSysex)
        );
    }

    #[test]
    fn sysex_payload_is_seven_bit() {
        let bytes = sample_bank().save_sysex();
        for &b in &bytes[5..bytes.len() - 1] {
            assert!(b < 0x10);
        }
    }

    #[test]
    fn binary_pads_with_init() {
        let bank = sample_bank();
        let mut data = Vec::new();
        for i in 0..2 {
            data.extend_from_slice(&bank.program(i).pack());
        }
        let loaded = Bank::load(&data).unwrap();
        assert_eq!(loaded.count(), 2);
        assert_eq!(loaded.program(1).name_str(), "BETA");
        assert_eq!(*loaded.program(2), Program::init());
    }

    #[test]
    fn binary_rejects_oversized() {
        let data = vec![0u8; (BANK_MAX_PROGRAMS + 1) * PROGRAM_PACKED_SIZE];
        assert_eq!(Bank::load(&data), Err(BankError::InvalidProgramCount));
    }

    #[test]
    fn json_roundtrip() {
        let bank = sample_bank();
        let text = bank.save_json();
        assert_eq!(Bank::load_json(&text).unwrap(), bank);
    }

    #[test]
    fn detect_by_content() {
        let bank = sample_bank();
        assert_eq!(Bank::load_detect(&bank.save_sysex()).unwrap(), bank);
        assert_eq!(
            Bank::load_detect(bank.save_json().as_bytes()).unwrap(),
            bank
        );
    }
}
