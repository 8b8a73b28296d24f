//! Building the data visible to a template application.
//!
//! The effective value chain (§ value precedence) is computed per template
//! application; the template manifest's `imports` sections act as a
//! whitelist deciding which of those values the template's files can see.
//! The resulting context has up to five top-level keys: `values`, `secrets`
//! and, when requested, the `target`, `targets` and `manifest` handles.

use anyhow::{Context, Result};
use serde_yaml::Value;

use crate::core::GokError;
use crate::manifest::{Manifest, Target};
use crate::render::engine::RenderSources;
use crate::template::TemplateManifest;
use crate::values::{deep_merge, lookup_nested, set_nested, Values};

/// The imported value trees visible to one template application frame.
///
/// Frames are additive across an inheritance chain: a child frame starts
/// from its parent's imports and layers its own on top.
#[derive(Debug, Clone, Default)]
pub(crate) struct FrameValues {
    pub(crate) values: Values,
    pub(crate) secrets: Values,
}

/// The effective values for a template application, lowest to highest:
/// manifest globals, target values, template-spec values, external file
/// overrides, flag overrides.
pub(crate) fn effective_values(
    sources: &RenderSources<'_>,
    target: &Target,
    spec_values: &Values,
) -> Values {
    let external = sources.external.values_for_target(&target.id);
    let flags = sources.flags.values_for_target(&target.id);
    deep_merge([
        &sources.manifest.values,
        &target.values,
        spec_values,
        &external,
        &flags,
    ])
}

/// Resolve the imports declared by a template manifest into the value trees
/// its files can reference.
pub(crate) fn build_frame(
    sources: &RenderSources<'_>,
    target: &Target,
    template_manifest: Option<&TemplateManifest>,
    spec_values: &Values,
    template_name: &str,
    inherited: Option<&FrameValues>,
) -> Result<FrameValues> {
    let mut frame = inherited.cloned().unwrap_or_default();
    let Some(manifest) = template_manifest else {
        return Ok(frame);
    };

    let effective = effective_values(sources, target, spec_values);
    for (key, requirement) in &manifest.imports.values {
        match lookup_nested(&effective, key) {
            Some(value) => {
                set_nested(&mut frame.values, key, value.clone())?;
                tracing::debug!("-> imported value {key:?}");
            }
            None if requirement.required => {
                tracing::error!(
                    "template required value {key:?} not found ({})",
                    requirement.description
                );
                return Err(GokError::RequiredValueMissing {
                    key: key.clone(),
                    template: template_name.to_string(),
                }
                .into());
            }
            None => {
                let default = requirement.default.clone().unwrap_or(Value::Null);
                tracing::debug!("-> using default for missing non-required value {key:?}");
                set_nested(&mut frame.values, key, default)?;
            }
        }
    }

    for (key, requirement) in &manifest.imports.secrets {
        match lookup_nested(sources.secrets, key) {
            Some(value) => {
                set_nested(&mut frame.secrets, key, value.clone())?;
                tracing::debug!("-> imported secret {key:?}");
            }
            None if requirement.required => {
                tracing::error!(
                    "template required secret {key:?} not found ({})",
                    requirement.description
                );
                return Err(GokError::RequiredValueMissing {
                    key: key.clone(),
                    template: template_name.to_string(),
                }
                .into());
            }
            None => {
                let default = requirement.default.clone().unwrap_or(Value::Null);
                set_nested(&mut frame.secrets, key, default)?;
            }
        }
    }

    Ok(frame)
}

/// Assemble the template execution context for one application frame.
pub(crate) fn build_context(
    sources: &RenderSources<'_>,
    target: &Target,
    template_manifest: Option<&TemplateManifest>,
    frame: &FrameValues,
) -> Result<tera::Context> {
    let mut root = Values::new();
    root.insert(
        Value::from("values"),
        Value::Mapping(frame.values.clone()),
    );
    root.insert(
        Value::from("secrets"),
        Value::Mapping(frame.secrets.clone()),
    );

    if let Some(manifest) = template_manifest {
        if manifest.imports.target.is_some() {
            root.insert(Value::from("target"), target_record(target));
        }

        if !manifest.imports.targets.is_empty() {
            let mut targets = Values::new();
            for id in manifest.imports.targets.keys() {
                let other = sources.manifest.targets.get(id).with_context(|| {
                    format!("imports.targets references unknown target {id:?}")
                })?;
                targets.insert(
                    Value::from(id.as_str()),
                    Value::Mapping(resolved_target_values(sources, other)),
                );
            }
            root.insert(Value::from("targets"), Value::Mapping(targets));
        }

        if manifest.imports.manifest.is_some() {
            root.insert(
                Value::from("manifest"),
                manifest_record(sources.manifest),
            );
        }
    }

    tera::Context::from_serialize(Value::Mapping(root)).context("build template context")
}

/// Effective values of a target as another template would observe them:
/// manifest globals, target values, and the target's external/flag
/// overrides.
pub(crate) fn resolved_target_values(sources: &RenderSources<'_>, target: &Target) -> Values {
    let external = sources.external.values_for_target(&target.id);
    let flags = sources.flags.values_for_target(&target.id);
    deep_merge([&sources.manifest.values, &target.values, &external, &flags])
}

fn target_record(target: &Target) -> Value {
    let mut record = Values::new();
    record.insert(Value::from("id"), Value::from(target.id.as_str()));
    record.insert(Value::from("output"), Value::from(target.output.as_str()));
    record.insert(
        Value::from("tags"),
        Value::Sequence(target.tags.iter().map(|t| Value::from(t.as_str())).collect()),
    );
    record.insert(Value::from("values"), Value::Mapping(target.values.clone()));
    Value::Mapping(record)
}

fn manifest_record(manifest: &Manifest) -> Value {
    let mut targets = Values::new();
    for (id, target) in &manifest.targets {
        targets.insert(Value::from(id.as_str()), target_record(target));
    }

    let mut record = Values::new();
    record.insert(Value::from("version"), Value::from(manifest.version));
    record.insert(Value::from("values"), Value::Mapping(manifest.values.clone()));
    record.insert(Value::from("targets"), Value::Mapping(targets));
    Value::Mapping(record)
}
