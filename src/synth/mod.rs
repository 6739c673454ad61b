pub mod dca;
pub mod env;
pub mod instrument;
pub mod lfo;
pub mod mod_buffer;
pub mod osc;
pub mod sat;
pub mod scratch;
pub mod vcf;
pub mod voice;

pub use self::dca::{Dca, Dca4};
pub use self::env::Env;
pub use self::instrument::{Instrument, PressureType, BANK_COUNT, POLY_MAX};
pub use self::lfo::Lfo;
pub use self::mod_buffer::ModBuffer;
pub use self::osc::Osc;
pub use self::sat::Sat;
pub use self::scratch::Scratch;
pub use self::vcf::Vcf;
pub use self::voice::{SharedMods, Voice};
