//! Feature engineering over repeat strings.

pub mod basket;
pub mod embeddings;
pub mod onehot;
pub mod positional;
pub mod transactions;
