pub mod accuracy;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod embed;
pub mod error;
pub mod gallery;

pub use accuracy::{evaluate, evaluate_report, Batch, EvalReport};
pub use classifier::{predict, KnnParams, Vote, UNKNOWN_LABEL};
pub use embed::{Embedder, Precomputed};
pub use error::EvalError;
pub use gallery::{Gallery, GalleryRecord};

// Re-export vision types for convenience
pub use faceval_vision::{Embedding, Encoder, EncoderOptions};
