//! Foundation types for termbase.
//!
//! This crate provides the domain records persisted by the store and the small
//! value types used to identify them. Every other termbase crate depends on
//! `termbase-types`.
//!
//! # Key Types
//!
//! - [`ConceptId`] — Stable numeric identifier, never reused within a kind
//! - [`Language`] — Closed enumeration of supported ISO 639-2 language codes
//! - [`Concept`] — A glossary entry with one [`LocalizedConcept`] per language
//! - [`AuthoritativeSource`] — Link to the normative source of a definition

pub mod concept;
pub mod error;
pub mod id;
pub mod language;

pub use concept::{AuthoritativeSource, Concept, LocalizedConcept};
pub use error::TypeError;
pub use id::ConceptId;
pub use language::Language;
