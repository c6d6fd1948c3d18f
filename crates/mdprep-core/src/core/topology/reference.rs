/// Which residue an atom-name reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResidueOffset {
    Previous,
    Current,
    Next,
}

/// A parsed atom-name reference from a template entry.
///
/// Template terms name atoms with optional markers: a leading `-` or `+` points to the
/// previous or next residue of the segment, and a leading `*` flags the central atom of an
/// improper internal coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomRef<'a> {
    pub offset: ResidueOffset,
    pub name: &'a str,
    pub improper_center: bool,
}

impl<'a> AtomRef<'a> {
    pub fn parse(reference: &'a str) -> Self {
        let (improper_center, rest) = match reference.strip_prefix('*') {
            Some(rest) => (true, rest),
            None => (false, reference),
        };
        let (offset, name) = if let Some(name) = rest.strip_prefix('-') {
            (ResidueOffset::Previous, name)
        } else if let Some(name) = rest.strip_prefix('+') {
            (ResidueOffset::Next, name)
        } else {
            (ResidueOffset::Current, rest)
        };
        Self {
            offset,
            name,
            improper_center,
        }
    }

    pub fn is_local(&self) -> bool {
        self.offset == ResidueOffset::Current
    }
}

/// Returns the bare atom name of a reference with all markers removed.
pub fn bare_name(reference: &str) -> &str {
    AtomRef::parse(reference).name
}

/// Rewrites a reference by transforming its bare name and keeping its markers.
pub(crate) fn map_name(reference: &str, f: impl FnOnce(&str) -> String) -> String {
    let parsed = AtomRef::parse(reference);
    let mut out = String::with_capacity(reference.len());
    if parsed.improper_center {
        out.push('*');
    }
    match parsed.offset {
        ResidueOffset::Previous => out.push('-'),
        ResidueOffset::Next => out.push('+'),
        ResidueOffset::Current => {}
    }
    out.push_str(&f(parsed.name));
    out
}
