use super::reference::{AtomRef, bare_name};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Patch name meaning "do not patch".
pub const NO_PATCH: &str = "NONE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateAtom {
    pub name: String,
    #[serde(rename = "type")]
    pub atom_type: String,
    pub charge: f64,
}

impl TemplateAtom {
    pub fn new(name: &str, atom_type: &str, charge: f64) -> Self {
        Self {
            name: name.to_string(),
            atom_type: atom_type.to_string(),
            charge,
        }
    }
}

/// One CHARMM-style internal-coordinate record `I J K L R(IJ) T(IJK) PHI T(JKL) R(KL)`.
///
/// Angles are stored in radians. A bond length or angle of exactly `0.0` means "take the
/// equilibrium value from the parameter tables". A `*` on the third atom marks an improper
/// record, where `R(IJ)` and `T(IJK)` describe the `I-K` bond and the `I-K-J` angle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawInternalCoordinate", into = "RawInternalCoordinate")]
pub struct InternalCoordinate {
    pub atoms: [String; 4],
    pub bond_ij: f64,
    pub angle_ijk: f64,
    pub torsion: f64,
    pub angle_jkl: f64,
    pub bond_kl: f64,
}

impl InternalCoordinate {
    pub fn is_improper(&self) -> bool {
        AtomRef::parse(&self.atoms[2]).improper_center
    }
}

/// On-disk form of an internal coordinate, angles in degrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInternalCoordinate {
    atoms: [String; 4],
    bond_ij: f64,
    angle_ijk: f64,
    torsion: f64,
    angle_jkl: f64,
    bond_kl: f64,
}

impl From<RawInternalCoordinate> for InternalCoordinate {
    fn from(raw: RawInternalCoordinate) -> Self {
        Self {
            atoms: raw.atoms,
            bond_ij: raw.bond_ij,
            angle_ijk: raw.angle_ijk.to_radians(),
            torsion: raw.torsion.to_radians(),
            angle_jkl: raw.angle_jkl.to_radians(),
            bond_kl: raw.bond_kl,
        }
    }
}

impl From<InternalCoordinate> for RawInternalCoordinate {
    fn from(ic: InternalCoordinate) -> Self {
        Self {
            atoms: ic.atoms,
            bond_ij: ic.bond_ij,
            angle_ijk: ic.angle_ijk.to_degrees(),
            torsion: ic.torsion.to_degrees(),
            angle_jkl: ic.angle_jkl.to_degrees(),
            bond_kl: ic.bond_kl,
        }
    }
}

/// Canonical definition of one residue type.
///
/// The order of `atoms` is the canonical atom order: assembled residues list their atoms
/// in exactly this order and missing atoms are searched for in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResidueTemplate {
    #[serde(default)]
    pub name: String,
    pub atoms: Vec<TemplateAtom>,
    #[serde(default)]
    pub bonds: Vec<[String; 2]>,
    #[serde(default)]
    pub impropers: Vec<[String; 4]>,
    #[serde(default)]
    pub cmaps: Vec<[String; 8]>,
    #[serde(default, rename = "ic")]
    pub internal_coordinates: Vec<InternalCoordinate>,
    #[serde(default)]
    pub first_patch: Option<String>,
    #[serde(default)]
    pub last_patch: Option<String>,
}

impl ResidueTemplate {
    pub fn atom(&self, name: &str) -> Option<&TemplateAtom> {
        self.atoms.iter().find(|atom| atom.name == name)
    }

    pub fn contains_atom(&self, name: &str) -> bool {
        self.atom(name).is_some()
    }

    pub fn atom_names(&self) -> impl Iterator<Item = &str> {
        self.atoms.iter().map(|atom| atom.name.as_str())
    }

    /// Replaces the atom with the same name in place, or appends it.
    pub fn upsert_atom(&mut self, atom: TemplateAtom) {
        match self.atoms.iter_mut().find(|existing| existing.name == atom.name) {
            Some(existing) => *existing = atom,
            None => self.atoms.push(atom),
        }
    }

    pub fn remove_atom(&mut self, name: &str) -> Option<TemplateAtom> {
        let index = self.atoms.iter().position(|atom| atom.name == name)?;
        Some(self.atoms.remove(index))
    }

    /// Drops every term that references one of `deleted` in the current residue.
    pub(crate) fn retain_terms_without(&mut self, deleted: &HashSet<String>) {
        let touches = |reference: &String| {
            let parsed = AtomRef::parse(reference);
            parsed.is_local() && deleted.contains(parsed.name)
        };
        self.bonds.retain(|term| !term.iter().any(touches));
        self.impropers.retain(|term| !term.iter().any(touches));
        self.cmaps.retain(|term| !term.iter().any(touches));
        self.internal_coordinates
            .retain(|ic| !ic.atoms.iter().any(touches));
    }

    /// Returns the patch to apply when this residue starts a segment, if any.
    pub fn effective_first_patch<'a>(&'a self, default: Option<&'a str>) -> Option<&'a str> {
        resolve_patch_name(self.first_patch.as_deref().or(default))
    }

    /// Returns the patch to apply when this residue ends a segment, if any.
    pub fn effective_last_patch<'a>(&'a self, default: Option<&'a str>) -> Option<&'a str> {
        resolve_patch_name(self.last_patch.as_deref().or(default))
    }
}

fn resolve_patch_name(name: Option<&str>) -> Option<&str> {
    name.filter(|n| !n.eq_ignore_ascii_case(NO_PATCH))
}

/// A named modification of a residue template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchTemplate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub delete: Vec<String>,
    #[serde(default)]
    pub atoms: Vec<TemplateAtom>,
    #[serde(default)]
    pub bonds: Vec<[String; 2]>,
    #[serde(default)]
    pub impropers: Vec<[String; 4]>,
    #[serde(default)]
    pub cmaps: Vec<[String; 8]>,
    #[serde(default, rename = "ic")]
    pub internal_coordinates: Vec<InternalCoordinate>,
}

impl PatchTemplate {
    /// Extracts the part of a two-residue patch that applies to one partner.
    ///
    /// Two-residue patches such as a disulfide bridge prefix atom names with the partner
    /// number (`1CB`, `2SG`). The returned patch keeps deletions, atoms and terms whose
    /// names all carry `partner` as prefix, with the prefix stripped. Terms that span both
    /// partners are left out.
    pub fn for_partner(&self, partner: char) -> PatchTemplate {
        let strip = |name: &str| name.strip_prefix(partner).map(str::to_string);
        let owns = |reference: &String| bare_name(reference).starts_with(partner);
        let rewrite = |reference: &String| {
            super::reference::map_name(reference, |name| {
                name.strip_prefix(partner).unwrap_or(name).to_string()
            })
        };

        PatchTemplate {
            name: format!("{}{}", self.name, partner),
            delete: self.delete.iter().filter_map(|name| strip(name)).collect(),
            atoms: self
                .atoms
                .iter()
                .filter_map(|atom| {
                    strip(&atom.name).map(|name| TemplateAtom {
                        name,
                        ..atom.clone()
                    })
                })
                .collect(),
            bonds: self
                .bonds
                .iter()
                .filter(|term| term.iter().all(owns))
                .map(|term| term.clone().map(|r| rewrite(&r)))
                .collect(),
            impropers: self
                .impropers
                .iter()
                .filter(|term| term.iter().all(owns))
                .map(|term| term.clone().map(|r| rewrite(&r)))
                .collect(),
            cmaps: self
                .cmaps
                .iter()
                .filter(|term| term.iter().all(owns))
                .map(|term| term.clone().map(|r| rewrite(&r)))
                .collect(),
            internal_coordinates: self
                .internal_coordinates
                .iter()
                .filter(|ic| ic.atoms.iter().all(owns))
                .map(|ic| InternalCoordinate {
                    atoms: ic.atoms.clone().map(|r| rewrite(&r)),
                    ..ic.clone()
                })
                .collect(),
        }
    }
}
