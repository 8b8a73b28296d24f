//! gok - layered configuration renderer
//!
//! gok produces, and then safely reconciles, a directory tree of server
//! configuration files from a declarative manifest. Reusable *templates*
//! (directories of files, some parameterized) compose into named *targets*;
//! the result is materialized as a directory or a tar(.gz) archive. A
//! subsequent *apply* step moves that artifact into a live destination,
//! detecting manual drift and refusing to clobber it by default.
//!
//! # Pipeline
//!
//! ```text
//! manifest + value sources
//!     -> render engine (layers, inheritance, deletions, strategies)
//!     -> work tree + lock file + artifact registrations
//!     -> artifact processor fills the work tree
//!     -> archive adapter packs
//! apply: extract -> three-way diff -> apply executor -> destination
//! ```
//!
//! # Core Modules
//!
//! - [`manifest`] - manifest parsing, validation and target selection
//! - [`values`] - the dynamic value model: deep merge, dotted lookup/set
//! - [`template`] - template metadata, deletions, parse-once text templates
//! - [`render`] - the per-target render engine and path resolution
//! - [`strategy`] - per-file policies: copy and structured merge patches
//! - [`artifact`] - content-addressed HTTP artifact fetching and caching
//! - [`lockfile`] - the rendered-state record enabling drift detection
//! - [`diff`] - three-way comparison of desired/last-known/actual state
//! - [`apply`] - the reconciling executor consuming a diff report
//! - [`archive`] - tar / tar.gz packing and extraction
//!
//! # Supporting Modules
//!
//! - [`cli`] - the `render` / `diff` / `apply` command surface
//! - [`core`] - error taxonomy and cooperative cancellation
//! - [`logging`] - tracing setup and the secret-redacting log sink
//! - [`constants`] - reserved file names and format versions
//! - [`utils`] - filesystem helpers (atomic writes, directory creation)

pub mod apply;
pub mod archive;
pub mod artifact;
pub mod cli;
pub mod constants;
pub mod core;
pub mod diff;
pub mod lockfile;
pub mod logging;
pub mod manifest;
pub mod render;
pub mod strategy;
pub mod template;
pub mod utils;
pub mod values;
