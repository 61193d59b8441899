//! Reading a Fluke 8840A/8842A front panel from its display and keypad bus.
//!
//! The meter multiplexes eight digits over a shared segment bus. Snapshots of the bus
//! are taken once per digit ([sampler]), decoded into a number and its annunciators
//! ([segments], [specials], [reading]), and checked for a short between the probes.
//! The keypad shares the first three strobes and can be both observed and driven ([keypad]).

pub mod buzzer;
pub mod keypad;
pub mod pins;
pub mod reading;
pub mod sampler;
pub mod segments;
pub mod specials;
pub mod synth;

/// Number of multiplexed digit positions, G0-G7.
pub const DIGIT_COUNT: usize = 8;

pub use pins::{LineMasks, LinePolarity, PinMap};
pub use reading::{ContinuityEvaluator, Reading, ReadingAssembler};
pub use sampler::{DigitFrame, DisplaySampler, SampleError};
