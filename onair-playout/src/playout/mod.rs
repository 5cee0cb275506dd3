//! Playout: single-flight queue, decoder bridge and the bus listener feeding it

mod decoder;
mod fifo;
mod listener;
mod queue;

pub use decoder::{CommandDecoder, DecodeLauncher, DecoderBridge, DEFAULT_TICK};
pub use fifo::{ensure_fifo, FifoStatus};
pub use listener::spawn_enqueue_listener;
pub use queue::PlayoutQueue;
