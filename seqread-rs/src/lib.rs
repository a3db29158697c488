//! seqread: reads short texts aloud, one after another.
//!
//! ```text
//! Unix datagram ─► receive ─► texts ─► synthesize (vvtts) ─► audio ─► play (aplay | sox)
//! ```
//!
//! Each stage runs at most one operation at a time; the [`Scheduler`] moves
//! items between stages on a fixed tick, so a slow synthesis never blocks
//! receipt and output order always matches receipt order.

pub mod config;
pub mod error;
pub mod player;
pub mod process;
pub mod receiver;
pub mod scheduler;
pub mod stage;
pub mod synthesizer;

pub use config::Config;
pub use error::{Result, SeqreadError};
pub use player::{CommandPlayer, PlaybackBackend};
pub use receiver::SocketReceiver;
pub use scheduler::{PipelineStats, Scheduler};
pub use stage::{AudioBuffer, PendingText};
pub use synthesizer::CommandSynthesizer;
