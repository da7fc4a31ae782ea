//! Keyword and TF-IDF search over the record archive.
//!
//! [`index`] builds an immutable snapshot of the archive, [`query`] evaluates a
//! request against it using [`filter`] and [`scoring`], and [`semantic`] provides
//! the optional vector space used for similarity ranking.

pub(crate) mod filter;
pub(crate) mod index;
pub(crate) mod query;
pub(crate) mod scoring;
pub(crate) mod semantic;
pub(crate) mod tokenize;

pub use semantic::{DisabledIndexer, SemanticIndexer, TfIdfIndex, TfIdfIndexer};
pub use tokenize::tokenize;
