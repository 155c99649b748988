pub mod config;
pub mod error;
pub mod ir;
pub mod location;
pub mod openapi;
pub mod raw;
pub mod refkey;
pub mod router;
pub mod schema;
pub mod source;

pub use config::Options;
pub use error::{Error, Result};
pub use ir::Ir;
pub use location::Location;
pub use openapi::Api;
pub use router::Router;
pub use source::{Cancellation, Document, DocumentSource, ExternalResolver, FileResolver,
    MapResolver, NoExternal};

use openapi::ApiParser;
use schema::SchemaArena;

/// Parse a root document into the API model and its schema graph.
pub fn parse(options: &Options, source: DocumentSource) -> Result<(Api, SchemaArena)> {
    ApiParser::new(options, source).parse()
}

/// Full front-end pipeline: parse the document and lower it to the IR the
/// template stage consumes.
pub fn compile(options: &Options, source: DocumentSource) -> Result<Ir> {
    let (api, arena) = parse(options, source)?;
    ir::IrBuilder::build(options, &api, &arena)
}

/// Convenience wrapper over [`compile`] for a document with no external
/// references.
pub fn compile_str(options: &Options, file: &str, text: &str) -> Result<Ir> {
    let document = Document::parse(file, text).map_err(Error::from)?;
    compile(options, DocumentSource::local(document))
}
