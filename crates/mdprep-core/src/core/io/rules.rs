use super::snapshot::StructureFile;
use crate::core::diagnostics::{Diagnostic, Diagnostics};
use crate::core::models::structure::ResidueSpecifier;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RuleFileError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

struct RuleLine<'a> {
    line: usize,
    keyword: &'a str,
    args: Vec<&'a str>,
}

fn rule_lines(content: &str) -> impl Iterator<Item = RuleLine<'_>> {
    content.lines().enumerate().filter_map(|(index, raw)| {
        let text = raw.split('#').next().unwrap_or("");
        let mut tokens = text.split_whitespace();
        let keyword = tokens.next()?;
        Some(RuleLine {
            line: index + 1,
            keyword,
            args: tokens.collect(),
        })
    })
}

fn read_file(path: &Path) -> Result<String, RuleFileError> {
    std::fs::read_to_string(path).map_err(|e| RuleFileError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

fn malformed(file: &str, rule: &RuleLine<'_>) -> Diagnostic {
    Diagnostic::MalformedRule {
        file: file.to_string(),
        line: rule.line,
        keyword: rule.keyword.to_string(),
    }
}

fn unknown(file: &str, rule: &RuleLine<'_>) -> Diagnostic {
    Diagnostic::UnknownRuleKeyword {
        file: file.to_string(),
        line: rule.line,
        keyword: rule.keyword.to_string(),
    }
}

/// Residue and atom renames applied to input records before assembly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenameRules {
    residue_aliases: HashMap<String, String>,
    /// Keyed by (residue name, atom name); an empty residue name matches any residue.
    atom_aliases: HashMap<(String, String), String>,
}

impl RenameRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path, diagnostics: &mut Diagnostics) -> Result<Self, RuleFileError> {
        let content = read_file(path)?;
        Ok(Self::parse(&content, &path.to_string_lossy(), diagnostics))
    }

    /// Parses `ALIASRES` and `ALIASATOM` lines.
    ///
    /// Lines with the wrong number of arguments or an unknown keyword are reported and
    /// skipped.
    pub fn parse(content: &str, file: &str, diagnostics: &mut Diagnostics) -> Self {
        let mut rules = Self::new();
        for rule in rule_lines(content) {
            match rule.keyword.to_ascii_uppercase().as_str() {
                "ALIASRES" => match rule.args.as_slice() {
                    [from, to] => rules.add_residue_alias(from, to),
                    _ => diagnostics.report(malformed(file, &rule)),
                },
                "ALIASATOM" => match rule.args.as_slice() {
                    [target, to] => match target.split_once(':') {
                        Some((residue, atom)) if !atom.is_empty() => {
                            rules.add_atom_alias(residue, atom, to)
                        }
                        _ => diagnostics.report(malformed(file, &rule)),
                    },
                    _ => diagnostics.report(malformed(file, &rule)),
                },
                _ => diagnostics.report(unknown(file, &rule)),
            }
        }
        debug!(
            residue_aliases = rules.residue_aliases.len(),
            atom_aliases = rules.atom_aliases.len(),
            "Rename rules parsed."
        );
        rules
    }

    pub fn add_residue_alias(&mut self, from: &str, to: &str) {
        self.residue_aliases.insert(from.to_string(), to.to_string());
    }

    pub fn add_atom_alias(&mut self, residue: &str, atom: &str, to: &str) {
        self.atom_aliases
            .insert((residue.to_string(), atom.to_string()), to.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.residue_aliases.is_empty() && self.atom_aliases.is_empty()
    }

    fn atom_alias(&self, residue: &str, atom: &str) -> Option<&str> {
        self.atom_aliases
            .get(&(residue.to_string(), atom.to_string()))
            .or_else(|| self.atom_aliases.get(&(String::new(), atom.to_string())))
            .map(String::as_str)
    }

    /// Renames residues and atoms in place and returns the number of names changed.
    ///
    /// Atom aliases are looked up with the residue name as read, before any residue
    /// alias is applied.
    pub fn apply(&self, file: &mut StructureFile) -> usize {
        let mut renamed = 0;
        for residue in file.segments.iter_mut().flat_map(|s| s.residues.iter_mut()) {
            for atom in &mut residue.atoms {
                if let Some(to) = self.atom_alias(&residue.name, &atom.name) {
                    atom.name = to.to_string();
                    renamed += 1;
                }
            }
            if let Some(to) = self.residue_aliases.get(&residue.name) {
                residue.name = to.clone();
                renamed += 1;
            }
        }
        renamed
    }
}

/// Explicit bonds requested alongside the structure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BondFile {
    pub disulfides: Vec<(ResidueSpecifier, ResidueSpecifier)>,
}

fn parse_specifier(token: &str) -> Option<ResidueSpecifier> {
    let (segment, residue) = token.split_once(':')?;
    Some(ResidueSpecifier::new(
        segment.trim().parse().ok()?,
        residue.trim().parse().ok()?,
    ))
}

impl BondFile {
    pub fn load(path: &Path, diagnostics: &mut Diagnostics) -> Result<Self, RuleFileError> {
        let content = read_file(path)?;
        Ok(Self::parse(&content, &path.to_string_lossy(), diagnostics))
    }

    /// Parses `DISUBOND <segment>:<residue> <segment>:<residue>` lines.
    pub fn parse(content: &str, file: &str, diagnostics: &mut Diagnostics) -> Self {
        let mut bonds = Self::default();
        for rule in rule_lines(content) {
            if !rule.keyword.eq_ignore_ascii_case("DISUBOND") {
                diagnostics.report(unknown(file, &rule));
                continue;
            }
            match rule.args.as_slice() {
                [a, b] => match (parse_specifier(a), parse_specifier(b)) {
                    (Some(a), Some(b)) => bonds.disulfides.push((a, b)),
                    _ => diagnostics.report(malformed(file, &rule)),
                },
                _ => diagnostics.report(malformed(file, &rule)),
            }
        }
        bonds
    }
}
