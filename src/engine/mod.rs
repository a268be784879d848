mod engine;
pub use engine::*;
mod hashing;
pub use hashing::*;
mod matcher;
pub use matcher::*;
mod peaks;
pub use peaks::*;
mod spectrogram;
pub use spectrogram::*;
