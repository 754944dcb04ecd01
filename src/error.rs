//! Crate-wide error type.
//!
//! Every variant except the I/O ones describes a programmer or configuration
//! mistake. Callers are expected to abort the run when one surfaces.
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ---- resolution ----
    #[error("identifier {name} is already declared for {existing}; cannot also declare it for {requested}")]
    DuplicateDeclaration {
        name: String,
        existing: String,
        requested: String,
    },
    #[error("embedded field of type {ty} resolved to `{schema}`, which is not an object schema")]
    EmbeddedNotObject { ty: String, schema: String },
    #[error("struct {ty} has more than one field marked as its transparent value")]
    MultipleValueFields { ty: String },
    #[error("type {ty} has kind {kind}, which has no JSON representation")]
    UnsupportedKind { ty: String, kind: String },
    #[error("{ty} refers to itself but has no name to refer to it by")]
    UnnamedRecursion { ty: String },
    #[error("format {template:?} has {holes} holes but got {args} arguments")]
    FormatArity { template: String, holes: usize, args: usize },

    // ---- templates ----
    #[error("template {template:?} has no `{{}}` placeholder")]
    MissingPlaceholder { template: String },
    #[error("template {template:?} references placeholder {{{name}}}, which matches no property")]
    UnknownPlaceholder { template: String, name: String },
    #[error("template {template:?} uses placeholder {{{name}}} more than once")]
    RepeatedPlaceholder { template: String, name: String },
    #[error("template {template:?} has an unbalanced brace at byte {offset}")]
    UnbalancedPlaceholder { template: String, offset: usize },
    #[error("schema `{schema}` cannot be embedded in a string template")]
    UnsupportedEmbedding { schema: String },
    #[error("template {template:?} produced an invalid pattern: {source}")]
    InvalidPattern {
        template: String,
        #[source]
        source: regex::Error,
    },

    // ---- doc comments ----
    #[error("no documentation entry for type {ty} in module {module:?}")]
    CommentNotFound { ty: String, module: String },
    #[error("no documentation source for module {module:?}")]
    ModuleNotFound { module: String },

    // ---- catalog ----
    #[error("invalid type expression {expr:?}: {reason}")]
    InvalidTypeExpr { expr: String, reason: String },
    #[error("unknown type {name:?}")]
    UnknownType { name: String },
    #[error("invalid declaration of {name}: {reason}")]
    InvalidDeclaration { name: String, reason: String },

    // ---- wire ----
    #[error("cannot encode value as {ty}: {reason}")]
    Encode { ty: String, reason: String },
    #[error("cannot decode JSON as {ty}: {reason}")]
    Decode { ty: String, reason: String },

    // ---- io ----
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
