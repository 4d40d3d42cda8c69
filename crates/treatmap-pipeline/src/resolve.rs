//! Preference ordering of autocomplete matches for one seed.

use std::collections::HashSet;
use treatmap_common::{canonical_id, normalize_name, ConceptKind, EntityRef};

/// Order `matches` for `seed` and keep at most `cap` ids.
///
/// Tiers, each deduplicated by id against the tiers before it:
///   1. normalized name equals the normalized seed
///   2. id equals the canonical `@<CONCEPT>_<slug>` id of the seed
///   3. normalized name contains the seed and no denylisted token
///   4. everything else, in server order
pub fn preferred_ids(
    seed: &str,
    kind: ConceptKind,
    matches: &[EntityRef],
    denylist: &[String],
    cap: usize,
) -> Vec<String> {
    let wanted = normalize_name(seed);
    let base_id = canonical_id(seed, kind);
    let denied = |name: &str| denylist.iter().any(|tok| name.contains(tok.to_lowercase().as_str()));

    let tiers: [&dyn Fn(&EntityRef) -> bool; 4] = [
        &|e: &EntityRef| normalize_name(&e.display_name) == wanted,
        &|e: &EntityRef| e.id == base_id,
        &|e: &EntityRef| {
            let name = normalize_name(&e.display_name);
            !wanted.is_empty() && name.contains(&wanted) && !denied(&name)
        },
        &|_: &EntityRef| true,
    ];

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for tier in tiers {
        for e in matches.iter().filter(|&e| tier(e)) {
            if seen.insert(e.id.as_str()) {
                out.push(e.id.clone());
            }
        }
    }
    out.truncate(cap);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chem(name: &str, id: &str) -> EntityRef {
        EntityRef::new(id, name, ConceptKind::Chemical)
    }

    fn denylist() -> Vec<String> {
        ["sulfone", "glucuronide", "metabolite", "hydroxy"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_name_first_and_denylisted_last() {
        let matches = vec![
            chem("metformin glucuronide", "@CHEMICAL_metformin_glucuronide"),
            chem("buformin", "@CHEMICAL_buformin"),
            chem("Metformin", "@CHEMICAL_Metformin"),
            chem("metformin hydrochloride", "@CHEMICAL_metformin_hcl"),
        ];
        let ids = preferred_ids("metformin", ConceptKind::Chemical, &matches, &denylist(), 200);
        assert_eq!(
            ids,
            vec![
                "@CHEMICAL_Metformin",
                "@CHEMICAL_metformin_hcl",
                "@CHEMICAL_metformin_glucuronide",
                "@CHEMICAL_buformin",
            ]
        );
    }

    #[test]
    fn test_canonical_id_tier_beats_substring() {
        let matches = vec![
            chem("metformin extended release", "@CHEMICAL_metformin_er"),
            chem("glucophage", "@CHEMICAL_metformin"),
        ];
        let ids = preferred_ids("metformin", ConceptKind::Chemical, &matches, &denylist(), 200);
        assert_eq!(ids, vec!["@CHEMICAL_metformin", "@CHEMICAL_metformin_er"]);
    }

    #[test]
    fn test_ordering_is_idempotent_and_capped() {
        let matches = vec![
            chem("metformin glucuronide", "@CHEMICAL_mg"),
            chem("metformin", "@CHEMICAL_metformin"),
            chem("phenformin", "@CHEMICAL_phenformin"),
        ];
        let first = preferred_ids("metformin", ConceptKind::Chemical, &matches, &denylist(), 200);
        let reordered: Vec<EntityRef> = first
            .iter()
            .map(|id| matches.iter().find(|m| &m.id == id).unwrap().clone())
            .collect();
        let second = preferred_ids("metformin", ConceptKind::Chemical, &reordered, &denylist(), 200);
        assert_eq!(first, second);

        let capped = preferred_ids("metformin", ConceptKind::Chemical, &matches, &denylist(), 1);
        assert_eq!(capped, vec!["@CHEMICAL_metformin"]);
    }

    #[test]
    fn test_same_id_under_two_names_appears_once() {
        let matches = vec![
            chem("warfarin sodium", "@CHEMICAL_warfarin"),
            chem("warfarin", "@CHEMICAL_warfarin"),
        ];
        let ids = preferred_ids("Warfarin", ConceptKind::Chemical, &matches, &denylist(), 200);
        assert_eq!(ids, vec!["@CHEMICAL_warfarin"]);
    }

    #[test]
    fn test_disease_seed_uses_disease_canonical_id() {
        let matches = vec![
            EntityRef::new("@DISEASE_Asthma_Severe", "severe asthma", ConceptKind::Disease),
            EntityRef::new("@DISEASE_asthma", "bronchial asthma", ConceptKind::Disease),
        ];
        let ids = preferred_ids("asthma", ConceptKind::Disease, &matches, &[], 200);
        assert_eq!(ids, vec!["@DISEASE_asthma", "@DISEASE_Asthma_Severe"]);
    }
}
