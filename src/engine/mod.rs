//! Content-based similarity engine.
//!
//! # Architecture
//!
//! - `tokenize`: case folding, word tokens, English stop words
//! - `vectorizer`: smoothed tf-idf over item descriptions
//! - `similarity`: dense pairwise cosine matrix
//! - `title_index`: title -> row lookup
//! - `model`: the immutable bundle and its build pipeline
//! - `artifact`: single-file persistence for a built model

mod artifact;
mod model;
mod similarity;
mod title_index;
mod tokenize;
mod vectorizer;

pub use artifact::ArtifactStore;
pub use model::{Model, ModelMeta};
