//! Declarative UI schema engine
//!
//! Turns a JSON-like widget schema plus a set of live named data feeds
//! (channels) into a tree of renderable nodes.
//!
//! # Architecture
//!
//! ```text
//! SchemaProject ──► SchemaResolver ──► ResolvedSchema + Vec<RequiredChannel>   (once per schema version)
//!                      │
//!                      └── SchemaStore (async collaborator)
//!
//! channel payloads ──► DataContext ──► Renderer ──► OutputNode tree            (every data update)
//!                                        │
//!                                        ├── Evaluator (interpolation, conditions, styles)
//!                                        ├── ValueFormatter
//!                                        └── path accessor
//! ```
//!
//! Resolution is asynchronous and cancellable; rendering is synchronous and
//! pure. Nothing on the render path returns an error: missing data, bad
//! arithmetic and type mismatches degrade to empty or neutral values.

pub mod config;
pub mod context;
pub mod error;
pub mod expr;
pub mod format;
pub mod observer;
pub mod path;
pub mod render;
pub mod resolver;
pub mod store;

pub use config::{EngineConfig, FormatterConfig, ResolverConfig};
pub use context::{DataContext, SELF_ALIAS};
pub use error::{EngineError, Result, StoreError};
pub use expr::{evaluate_condition, evaluate_expression, interpolate, resolve_style, Evaluator};
pub use format::{format_value, ValueFormatter};
pub use observer::{EvalObserver, NoopObserver, SkipReason, TracingObserver};
pub use path::get_value;
pub use render::{render, Rendered, Renderer};
pub use resolver::{CancelFlag, Resolution, ResolutionPath, ResolvedSchema, SchemaResolver};
pub use store::{FileSchemaStore, InMemorySchemaStore, SchemaStore};

pub use schema_types;
