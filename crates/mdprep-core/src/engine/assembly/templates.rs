use crate::core::models::ids::ResidueId;
use crate::core::models::segment::Segment;
use crate::core::models::structure::Structure;
use crate::core::topology::library::TopologyLibrary;
use crate::core::topology::patch::{PatchPlacement, apply_patch};
use crate::core::topology::template::{NO_PATCH, ResidueTemplate};
use crate::engine::config::AssemblyConfig;
use crate::engine::error::EngineError;
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminus {
    First,
    Last,
}

fn patch_name<'a>(
    terminus: Terminus,
    segment: &str,
    base: &'a ResidueTemplate,
    library: &'a TopologyLibrary,
    config: &'a AssemblyConfig,
) -> Option<&'a str> {
    let (overrides, default) = match terminus {
        Terminus::First => (&config.first_patch_overrides, library.default_first_patch()),
        Terminus::Last => (&config.last_patch_overrides, library.default_last_patch()),
    };
    match overrides.get(segment) {
        Some(name) => Some(name.as_str()).filter(|n| !n.eq_ignore_ascii_case(NO_PATCH)),
        None => match terminus {
            Terminus::First => base.effective_first_patch(default),
            Terminus::Last => base.effective_last_patch(default),
        },
    }
}

/// Selects the effective template of every residue of a segment.
///
/// Interior residues borrow their library template. The first residue gets the chain-start
/// patch placed in front of its atoms, the last residue gets the chain-end patch appended,
/// and a lone residue gets both, the end patch being the one its own template asks for.
/// `overrides` replaces the library template of individual residues before patching.
///
/// # Errors
///
/// Returns [`EngineError::UnknownResidueTemplate`] or [`EngineError::UnknownPatch`] when a
/// residue or a requested patch is missing from the library.
pub(crate) fn segment_templates<'a>(
    structure: &Structure,
    segment: &Segment,
    library: &'a TopologyLibrary,
    overrides: &'a HashMap<ResidueId, ResidueTemplate>,
    config: &'a AssemblyConfig,
) -> Result<Vec<Cow<'a, ResidueTemplate>>, EngineError> {
    let count = segment.len();
    let mut templates = Vec::with_capacity(count);

    for (index, &residue_id) in segment.residues().iter().enumerate() {
        let label = structure
            .residue_label(residue_id)
            .ok_or_else(|| EngineError::Internal("residue without segment".to_string()))?;
        let base = match overrides.get(&residue_id) {
            Some(template) => template,
            None => library
                .residue(&label.name)
                .ok_or_else(|| EngineError::UnknownResidueTemplate {
                    residue: label.clone(),
                })?,
        };

        let patch = |template: &ResidueTemplate,
                     terminus: Terminus|
         -> Result<Option<ResidueTemplate>, EngineError> {
            let Some(name) = patch_name(terminus, &segment.name, base, library, config) else {
                return Ok(None);
            };
            let patch = library.patch(name).ok_or_else(|| EngineError::UnknownPatch {
                name: name.to_string(),
                residue: label.clone(),
            })?;
            let placement = match terminus {
                Terminus::First => PatchPlacement::Leading,
                Terminus::Last => PatchPlacement::Trailing,
            };
            debug!(residue = %label, patch = name, "Applying terminal patch.");
            Ok(Some(apply_patch(template, patch, placement)))
        };

        let first = index == 0;
        let last = index + 1 == count;
        let template = if first && last {
            let started = patch(base, Terminus::First)?;
            let start = started.as_ref().unwrap_or(base);
            match patch(start, Terminus::Last)? {
                Some(both) => Cow::Owned(both),
                None => started.map_or(Cow::Borrowed(base), Cow::Owned),
            }
        } else if first {
            patch(base, Terminus::First)?.map_or(Cow::Borrowed(base), Cow::Owned)
        } else if last {
            patch(base, Terminus::Last)?.map_or(Cow::Borrowed(base), Cow::Owned)
        } else {
            Cow::Borrowed(base)
        };
        templates.push(template);
    }
    Ok(templates)
}
