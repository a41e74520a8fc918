//! DSP primitives: noise, filters, oscillators, envelopes and mixing.
//!
//! All DSP runs in Rust so the synthesized beds sound the same whether
//! pulled by a WebAudio AudioWorklet (via WASM) or by a native host.

pub mod envelope;
pub mod filter;
pub mod mixer;
pub mod modulator;
pub mod noise;
pub mod oscillator;
pub mod sampler;
pub mod voice;

/// Samples rendered per block (the WebAudio render quantum).
pub const BLOCK_SIZE: usize = 128;
