use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;

use unicode_normalization::UnicodeNormalization;

use crate::config::AliasTable;
use crate::records::RegionId;

/// Canonical form of an administrative name, optionally scoped to a region.
///
/// Equality of keys is the only join predicate used across the crate.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd, Serialize)]
pub struct NormalizedKey {
    name: String,
    region: Option<RegionId>,
}

impl NormalizedKey {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> Option<RegionId> {
        self.region
    }

    pub fn with_region(self, region: Option<RegionId>) -> NormalizedKey {
        NormalizedKey {
            name: self.name,
            region,
        }
    }
}

impl Display for NormalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.region {
            Some(r) => write!(f, "{}@{}", self.name, r),
            None => write!(f, "{}", self.name),
        }
    }
}

// Characters dropped without leaving a gap: "O'Higgins" -> "ohiggins", "Pto." -> "pto".
const DELETED: &[char] = &['\'', '\u{2019}', '\u{2018}', '`', '\u{b4}', '"', '.', ',', '\u{b7}'];

/// Text normalizer for administrative names.
///
/// The alias table is compiled once: every variant points directly at the
/// final canonical key, so that normalizing a normalized key is a no-op.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    aliases: HashMap<String, String>,
}

impl Normalizer {
    pub fn new(table: &AliasTable) -> Normalizer {
        // First pass: canonical form of both sides.
        let mut direct: HashMap<String, String> = HashMap::new();
        for (variant, canonical) in table.0.iter() {
            let target = mechanical(&fold(canonical));
            for k in [fold(variant), mechanical(&fold(variant))] {
                if k != target {
                    direct.insert(k, target.clone());
                }
            }
        }

        // Second pass: follow chains, so that aliases always point to a final key.
        let mut aliases: HashMap<String, String> = HashMap::new();
        for (k, first) in direct.iter() {
            let mut cur = first.clone();
            let mut hops = 0;
            while let Some(next) = direct.get(&cur) {
                hops += 1;
                if hops > direct.len() {
                    warn!("Normalizer::new: alias cycle through {:?}, ignored", k);
                    break;
                }
                cur = next.clone();
            }
            if hops <= direct.len() {
                aliases.insert(k.clone(), cur);
            }
        }

        // A canonical target can never be itself a variant of something else.
        let targets: Vec<String> = aliases.values().cloned().collect();
        for t in targets.iter() {
            if aliases.remove(t).is_some() {
                warn!("Normalizer::new: {:?} is both a variant and a target", t);
            }
        }
        debug!("Normalizer::new: {} alias keys", aliases.len());
        Normalizer { aliases }
    }

    /// Normalizer without any alias.
    pub fn plain() -> Normalizer {
        Normalizer::default()
    }

    /// Canonicalizes a name. Total: unknown characters are dropped, never rejected.
    pub fn normalize(&self, name: &str) -> NormalizedKey {
        let folded = fold(name);
        let mech = mechanical(&folded);
        let name = match self
            .aliases
            .get(&folded)
            .or_else(|| self.aliases.get(&mech))
        {
            Some(target) => target.clone(),
            None => mech,
        };
        NormalizedKey { name, region: None }
    }

    pub fn normalize_in(&self, name: &str, region: Option<RegionId>) -> NormalizedKey {
        self.normalize(name).with_region(region)
    }
}

// Lower-case, strip diacritics through canonical decomposition, collapse whitespace.
fn fold(s: &str) -> String {
    let lowered: String = s
        .to_lowercase()
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect();
    collapse(&lowered)
}

// Punctuation policy on folded text. Hyphens survive only between two alphanumerics.
fn mechanical(folded: &str) -> String {
    let chars: Vec<char> = folded.chars().collect();
    let mut out = String::with_capacity(folded.len());
    for (i, c) in chars.iter().enumerate() {
        let c = *c;
        if c.is_alphanumeric() {
            out.push(c);
        } else if c == '-' {
            let prev_ok = i > 0 && chars[i - 1].is_alphanumeric();
            let next_ok = chars.get(i + 1).map(|n| n.is_alphanumeric()).unwrap_or(false);
            if prev_ok && next_ok {
                out.push('-');
            } else {
                out.push(' ');
            }
        } else if DELETED.contains(&c) {
            continue;
        } else {
            out.push(' ');
        }
    }
    collapse(&out)
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<&str>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn with_aliases(pairs: &[(&str, &str)]) -> Normalizer {
        let m: BTreeMap<String, String> = pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        Normalizer::new(&AliasTable(m))
    }

    #[test]
    fn strips_accents_case_and_spacing() {
        let n = Normalizer::plain();
        assert_eq!(n.normalize("  Ñuñoa ").name(), "nunoa");
        assert_eq!(n.normalize("Estación   Central").name(), "estacion central");
        assert_eq!(n.normalize("MAIPÚ").name(), "maipu");
    }

    #[test]
    fn punctuation_policy() {
        let n = Normalizer::plain();
        assert_eq!(n.normalize("O'Higgins").name(), "ohiggins");
        assert_eq!(n.normalize("Pto. Montt").name(), "pto montt");
        assert_eq!(n.normalize("Llay-Llay").name(), "llay-llay");
        assert_eq!(n.normalize("-Llay - Llay-").name(), "llay llay");
        assert_eq!(n.normalize("Cabo de Hornos (Ex-Navarino)").name(), "cabo de hornos ex-navarino");
        assert_eq!(n.normalize("jara_pct").name(), "jara pct");
        assert_eq!(n.normalize("Jara %").name(), "jara");
    }

    #[test]
    fn aliases_take_priority() {
        let n = with_aliases(&[
            ("Llay-Llay", "Llaillay"),
            ("Cabo de Hornos (Ex-Navarino)", "Cabo de Hornos"),
            ("Pto. Montt", "Puerto Montt"),
        ]);
        assert_eq!(n.normalize("LLAY-LLAY").name(), "llaillay");
        assert_eq!(n.normalize("Llay Llay").name(), "llay llay");
        assert_eq!(n.normalize("cabo de hornos (ex-navarino)").name(), "cabo de hornos");
        assert_eq!(n.normalize("Pto Montt").name(), "puerto montt");
        assert_eq!(n.normalize("Puerto Montt").name(), "puerto montt");
    }

    #[test]
    fn alias_chains_resolve_to_the_final_target() {
        let n = with_aliases(&[("A", "B"), ("B", "C")]);
        assert_eq!(n.normalize("a").name(), "c");
        assert_eq!(n.normalize("b").name(), "c");
        assert_eq!(n.normalize("c").name(), "c");
    }

    #[test]
    fn normalize_is_idempotent() {
        let n = with_aliases(&[("Llay-Llay", "Llaillay"), ("Trehuaco", "Treguaco"), ("A", "B"), ("B", "C")]);
        let inputs = [
            "Ñuñoa",
            "  San  Pedro de la Paz ",
            "O'Higgins",
            "Llay-Llay",
            "--a--b--",
            "x.-y",
            "Cabo de Hornos (Ex-Navarino)",
            "İstanbul",
            "Trehuaco",
            "a",
            "Jara %",
            "",
            "¿?¡!",
        ];
        for x in inputs.iter() {
            let once = n.normalize(x);
            let twice = n.normalize(once.name());
            assert_eq!(once, twice, "not idempotent on {:?}", x);
        }
    }

    #[test]
    fn total_on_garbage() {
        let n = Normalizer::plain();
        assert_eq!(n.normalize("¿?¡!").name(), "");
        assert_eq!(n.normalize("").name(), "");
    }

    #[test]
    fn keys_carry_region_scope() {
        let n = Normalizer::plain();
        let a = n.normalize_in("La Florida", Some(RegionId(13)));
        let b = n.normalize_in("la florida", Some(RegionId(8)));
        assert_ne!(a, b);
        assert_eq!(a.name(), b.name());
        assert_eq!(a.to_string(), "la florida@13");
    }
}
