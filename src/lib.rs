//! Ambient entity renderer: a particle field that changes character with
//! the mode reported by an observer process.

pub mod app;
pub mod channel;
pub mod compositor;
pub mod config;
pub mod error;
pub mod field;
pub mod forces;
pub mod frame;
pub mod mode_table;
pub mod noise;
pub mod presenter;
pub mod transition;
pub mod types;

pub use channel::{LatestSlot, ModeListener, ModeUpdate};
pub use config::RendererConfig;
pub use error::{Result, SentinelError};
pub use frame::{EntityPipeline, FrameContext};
pub use types::{Mode, ModeParams};
