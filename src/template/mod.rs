//! Template metadata and the text-template engine.
//!
//! A template is a directory of files. It may carry a `gok-template.yaml`
//! describing its value imports and inheritance ([`manifest`]), and a
//! `gok-deletions.yaml` listing paths to remove from the target output
//! before the template's files are applied ([`deletions`]). Parameterized
//! files are executed through a content-keyed parse cache ([`cache`]).

pub mod cache;
pub mod deletions;
pub mod manifest;

pub use cache::TemplateCache;
pub use deletions::{read_deletions, Deletion, DeletionsFile};
pub use manifest::{
    read_template_manifest, HandleRequest, ImportRequirement, Imports, InheritSpec, Maintainer,
    TargetAccess, TemplateManifest,
};
