//! Catalog, configuration and trace primitives shared by the gateway, the agent loop and the CLI.

pub mod catalog;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod trace;

pub use catalog::{
    Base, Catalog, CatalogEntry, HttpMethod, ParamKind, ParamsSchema, PathTemplate, RawRecord,
    ResolvedPath, TemplateError,
};
pub use discovery::{DiscoveryService, EndpointSummary};
pub use errors::{CallError, LoadError, ToolFailure};
pub use trace::{SessionTrace, TraceEntry, TraceOutcome, TraceTool};
