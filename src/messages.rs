//! Messages crossing the editor/engine boundary.
//!
//! Requests flow editor → engine, notifications engine → editor, both
//! over bounded channels so the audio side never blocks. Large payloads
//! are boxed to keep the channel slots small.

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::bank::Bank;
use crate::program::{Program, PROGRAM_NAME_LEN};

/// Capacity of the request and notification channels.
pub const CHANNEL_CAPACITY: usize = 16;

#[derive(Clone, Debug)]
pub enum Request {
    SetProgram { prog: u32 },
    SetBank { bank: u32 },
    LoadBank { data: Box<Bank> },
    RenameProgram { name: [u8; PROGRAM_NAME_LEN] },
    InitProgram,
    WriteProgram,
    SetParameter { index: u32, value: i32 },
    GetBankData { bank: u32 },
    NoteOn { key: u8, velocity: u8 },
    NoteOff { key: u8, velocity: u8 },
}

#[derive(Clone, Debug)]
pub enum Notification {
    Bank {
        num: u32,
        data: Box<Bank>,
    },
    Program {
        bank: u32,
        prog: u32,
        data: Box<Program>,
    },
    Write,
}

/// Where the engine posts notifications. Emission is fallible: a full
/// channel reports failure and the engine retries next block.
pub trait NotificationSink {
    fn emit_notification(&self, ntf: Notification) -> bool;
}

impl NotificationSink for Sender<Notification> {
    fn emit_notification(&self, ntf: Notification) -> bool {
        match self.try_send(ntf) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// A sink that drops everything, for hosts without an editor attached.
pub struct NullSink;

impl NotificationSink for NullSink {
    fn emit_notification(&self, _ntf: Notification) -> bool {
        true
    }
}

pub fn notification_channel() -> (Sender<Notification>, Receiver<Notification>) {
    crossbeam_channel::bounded(CHANNEL_CAPACITY)
}

pub fn request_channel() -> (Sender<Request>, Receiver<Request>) {
    crossbeam_channel::bounded(CHANNEL_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_channel_reports_failure() {
        let (tx, rx) = crossbeam_channel::bounded::<Notification>(1);
        assert!(tx.emit_notification(Notification::Write));
        assert!(!tx.emit_notification(Notification::Write));
        rx.recv().unwrap();
        assert!(tx.emit_notification(Notification::Write));
    }

    #[test]
    fn disconnected_channel_reports_failure() {
        let (tx, rx) = notification_channel();
        drop(rx);
        assert!(!tx.emit_notification(Notification::Write));
    }
}
