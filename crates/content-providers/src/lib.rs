//! Provider contracts for the three external media/text generators the core
//! depends on, plus deterministic local stand-ins used for tests and a
//! cost-free deployment.

mod image;
mod llm;
mod video;

pub use image::{ImageProvider, ImageResult, LocalPlaceholderImage};
pub use llm::{LlmProvider, LlmResponse, LocalEchoLlm};
pub use video::{LocalPlaceholderVideo, VideoPayload, VideoProvider, VideoResult};
