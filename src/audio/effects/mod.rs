//! Effect implementations
//!
//! One module per `EffectKind`. Each exposes its parameter table and a DSP
//! state implementing [`Effect`](super::node::Effect).

mod compressor;
mod delay;
mod distortion;
mod filter;
mod gain;
mod reverb;

pub use compressor::{Compressor, COMPRESSOR_PARAMS};
pub use delay::{Delay, DELAY_PARAMS, MAX_DELAY_SECONDS};
pub use distortion::{Distortion, DISTORTION_PARAMS};
pub use filter::{Filter, FilterType, FILTER_PARAMS};
pub use gain::{Gain, GAIN_PARAMS};
pub use reverb::{Reverb, REVERB_PARAMS};
