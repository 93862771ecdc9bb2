//! Message Translator: protocol detection, rule-driven and built-in
//! pairwise conversion, and schema validation between heterogeneous agent
//! endpoints. Grounded on `AdapterRegistry`'s protocol-keyed trait-object
//! registry (`packages/pillars/nexus/src/protocols/adapter.rs`), generalized
//! from a registry of live adapters to a registry of translation rules and
//! protocol schemas.

mod convert;
mod detect;
mod schema;
mod translator;

pub use detect::detect_protocol;
pub use translator::{MessageTranslator, TranslatorConfig};
