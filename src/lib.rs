pub mod bank;
pub mod data;
pub mod engine;
pub mod fixed;
pub mod messages;
pub mod midi_input;
pub mod program;
pub mod synth;
pub mod tables;

pub use bank::{Bank, BankError, BankFormat};
pub use data::{LfoWave, ModSource, WaveBank};
pub use engine::Engine;
pub use messages::{Notification, NotificationSink, Request};
pub use midi_input::MidiInputHandler;
pub use program::{Program, PARAM_COUNT, PROGRAM_NAME_LEN, PROGRAM_PACKED_SIZE};
pub use synth::Instrument;
pub use tables::RateTables;

/// Largest frame count a single synthesis call may be asked for.
/// Scratch and modulation buffers are sized against this.
pub const BLOCK_MAX: usize = 512;

/// Frames per internal synthesis block in the standalone host.
pub const BLOCK_FRAMES: usize = 64;
