//! Structured, non-fatal problems found while preparing a system.
//!
//! Components receive a `&mut Diagnostics` and push a [`Diagnostic`] whenever they
//! substitute a default, drop a term or skip an input line. Every report is also
//! emitted as a `warn!` event so interactive runs see it in the log.

use std::fmt;
use tracing::warn;

/// Identifies a residue in diagnostics by segment, number and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResidueLabel {
    pub segment: String,
    pub number: isize,
    pub name: String,
}

impl ResidueLabel {
    pub fn new(segment: &str, number: isize, name: &str) -> Self {
        Self {
            segment: segment.to_string(),
            number,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ResidueLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.segment, self.name, self.number)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    UnknownRuleKeyword {
        file: String,
        line: usize,
        keyword: String,
    },
    MalformedRule {
        file: String,
        line: usize,
        keyword: String,
    },
    AmbiguousDisulfide {
        sulfur: ResidueLabel,
        partners: Vec<ResidueLabel>,
    },
    DuplicateDisulfide {
        residue: ResidueLabel,
    },
    MissingBondParameter {
        types: [String; 2],
    },
    MissingAngleParameter {
        types: [String; 3],
    },
    MissingDihedralParameter {
        types: [String; 4],
    },
    MissingImproperParameter {
        types: [String; 4],
    },
    MissingCmapParameter {
        types: Vec<String>,
    },
    MissingMass {
        atom_type: String,
    },
    DiscardedAtom {
        residue: ResidueLabel,
        atom: String,
    },
    UnresolvedReference {
        residue: ResidueLabel,
        reference: String,
    },
    NonIntegerCharge {
        charge: f64,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownRuleKeyword {
                file,
                line,
                keyword,
            } => write!(f, "{file}:{line}: unknown argument '{keyword}'"),
            Self::MalformedRule {
                file,
                line,
                keyword,
            } => write!(f, "{file}:{line}: missing or too many arguments for '{keyword}'"),
            Self::AmbiguousDisulfide { sulfur, partners } => {
                let partners: Vec<String> = partners.iter().map(ToString::to_string).collect();
                write!(
                    f,
                    "sulfur of {sulfur} has more than one disulfide partner: {}",
                    partners.join(", ")
                )
            }
            Self::DuplicateDisulfide { residue } => {
                write!(f, "{residue} is listed in more than one disulfide bond")
            }
            Self::MissingBondParameter { types } => {
                write!(f, "no bond parameter for {}", types.join("-"))
            }
            Self::MissingAngleParameter { types } => {
                write!(f, "no angle parameter for {}", types.join("-"))
            }
            Self::MissingDihedralParameter { types } => {
                write!(f, "no dihedral parameter for {}", types.join("-"))
            }
            Self::MissingImproperParameter { types } => {
                write!(f, "no improper parameter for {}", types.join("-"))
            }
            Self::MissingCmapParameter { types } => {
                write!(f, "no CMAP parameter for {}", types.join("-"))
            }
            Self::MissingMass { atom_type } => write!(f, "no mass for atom type '{atom_type}'"),
            Self::DiscardedAtom { residue, atom } => {
                write!(f, "atom '{atom}' of {residue} is not in its template and was discarded")
            }
            Self::UnresolvedReference { residue, reference } => {
                write!(f, "cannot resolve atom reference '{reference}' from {residue}")
            }
            Self::NonIntegerCharge { charge } => {
                write!(f, "non-integer net charge {charge:.6}")
            }
        }
    }
}

/// Collects diagnostics for one preparation run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        warn!("{}", diagnostic);
        self.entries.push(diagnostic);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_where(&self, predicate: impl Fn(&Diagnostic) -> bool) -> usize {
        self.entries.iter().filter(|d| predicate(d)).count()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
