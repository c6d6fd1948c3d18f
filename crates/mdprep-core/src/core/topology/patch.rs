use super::template::{PatchTemplate, ResidueTemplate};
use std::collections::HashSet;

/// Where atoms introduced by a patch end up in the patched atom order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchPlacement {
    /// Patch atoms come first, followed by the remaining template atoms (chain starts).
    Leading,
    /// Template atoms keep their order, new patch atoms are appended (chain ends).
    Trailing,
}

/// Applies a patch to a template and returns the patched copy.
///
/// The source template is never modified. Atoms of the patch override template atoms of
/// the same name; the listed atoms are deleted; every bond, improper, CMAP and internal
/// coordinate touching a deleted atom is dropped; and the patch's own terms are placed in
/// front of the remaining template terms in their declared order.
pub fn apply_patch(
    template: &ResidueTemplate,
    patch: &PatchTemplate,
    placement: PatchPlacement,
) -> ResidueTemplate {
    let mut patched = template.clone();

    match placement {
        PatchPlacement::Leading => {
            let mut atoms = patch.atoms.clone();
            atoms.extend(
                template
                    .atoms
                    .iter()
                    .filter(|atom| !patch.atoms.iter().any(|p| p.name == atom.name))
                    .cloned(),
            );
            patched.atoms = atoms;
            for name in &patch.delete {
                patched.remove_atom(name);
            }
        }
        PatchPlacement::Trailing => {
            for name in &patch.delete {
                patched.remove_atom(name);
            }
            for atom in &patch.atoms {
                patched.upsert_atom(atom.clone());
            }
        }
    }

    let deleted: HashSet<String> = patch.delete.iter().cloned().collect();
    patched.retain_terms_without(&deleted);

    prepend(&mut patched.bonds, &patch.bonds);
    prepend(&mut patched.impropers, &patch.impropers);
    prepend(&mut patched.cmaps, &patch.cmaps);
    prepend(
        &mut patched.internal_coordinates,
        &patch.internal_coordinates,
    );

    patched
}

fn prepend<T: Clone>(terms: &mut Vec<T>, front: &[T]) {
    terms.splice(0..0, front.iter().cloned());
}
