//! Crate-level scenarios over the retriever, extractor and engine.

mod pipeline;
mod properties;
pub(crate) mod support;
