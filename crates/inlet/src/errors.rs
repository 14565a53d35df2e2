//! 💀 Errors callers can actually match on.
//!
//! Everything else in the crate travels as `anyhow::Error` with a context chain.
//! These are the exceptions: the resolver giving up on a source, and a typo in a
//! source kind. Both fatal. Both worth a specific message.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InletError {
    /// 🤷 No dispatch rule matched and no explicit kind rescued us.
    #[error(
        "💀 Unrecognized source type: '{source_descriptor}'. Please either manually specify the \
         type (solr, elastic, json_stream, large_json, folder), or convert your input to a supported type."
    )]
    UnrecognizedSource { source_descriptor: String },

    #[error("💀 '{0}' is not a source kind. Try one of: auto, solr, elastic, json_stream, large_json, folder.")]
    UnknownSourceKind(String),
}
