//! Password-guess generation from a probabilistic context-free grammar.
//!
//! A trained model decomposes passwords into structural templates over the
//! categories letter (`L`), digit (`D`) and special (`S`), together with
//! probability tables for the digit and special runs and a letter dictionary.
//! The [`grammar`] module loads such a model and enumerates every derivable
//! password in non-increasing order of probability; the [`trainer`] module
//! builds the model from a plaintext corpus and an external wordlist.

pub mod grammar;
pub mod trainer;
