//! The render engine: per-target orchestration of template layers.
//!
//! For each selected target the engine resolves the output directory inside
//! the work tree, applies every template layer in order (recursing through
//! inheritance with cycle detection), honors explicit deletions, classifies
//! each file (artifact spec, parameterized, plain) and dispatches it to a
//! file strategy. Artifact fetches are registered during the walk and
//! resolved only after all targets have rendered.

mod context;
mod engine;
mod path;

pub use engine::{Engine, RenderSources};
pub use path::PathResolver;
