// src/routing/pair.rs
//
// Le chooser au niveau de la paire : étant donné deux mints, quels pools
// existent, lesquels peuvent servir de relais de route, et lequel proposer
// par défaut. La préférence est lexicale, pas un score : official d'abord,
// jamais un stable face à un non-stable, puis la plus grosse supply LP
// normalisée.

use solana_sdk::pubkey::Pubkey;
use std::cmp::Ordering;
use std::str::FromStr;

use crate::api::{PoolCatalog, PoolDescriptor, is_middle_mint};
use crate::math::fraction;
use crate::routing::PoolStateMap;

/// Le résultat du scan d'une paire.
#[derive(Debug, Clone, Default)]
pub struct PairPools {
    /// Tous les pools dont la paire (non ordonnée) correspond.
    pub availables: Vec<PoolDescriptor>,
    /// Le pool à proposer par défaut, si départageable.
    pub best: Option<PoolDescriptor>,
    /// Les pools utilisables comme relais de route pour cette paire.
    /// Calculé pour l'appelant, jamais utilisé dans le départage.
    pub route_related: Vec<PoolDescriptor>,
}

/// Normalise une entrée "mint" en clé canonique. Accepte une adresse
/// base58 ; tout le reste devient None.
pub fn normalize_mint(mint: Option<&str>) -> Option<Pubkey> {
    Pubkey::from_str(mint?.trim()).ok()
}

/// Scanne le catalogue pour la paire : pools directs et pools de relais.
pub fn scan_pair(catalog: &PoolCatalog, mint1: &Pubkey, mint2: &Pubkey) -> (Vec<PoolDescriptor>, Vec<PoolDescriptor>) {
    let availables: Vec<PoolDescriptor> = catalog
        .pools
        .iter()
        .filter(|p| p.matches_pair(mint1, mint2))
        .cloned()
        .collect();

    let route_related: Vec<PoolDescriptor> = catalog
        .pools
        .iter()
        .filter(|p| {
            let base_allowed = is_middle_mint(&p.base_mint) || p.base_mint == *mint1 || p.base_mint == *mint2;
            let quote_allowed = is_middle_mint(&p.quote_mint) || p.quote_mint == *mint1 || p.quote_mint == *mint2;
            // Un pool entièrement entre deux pivots ne concerne pas la
            // paire demandée.
            let both_middle = is_middle_mint(&p.base_mint) && is_middle_mint(&p.quote_mint);
            base_allowed && quote_allowed && !both_middle
        })
        .cloned()
        .collect();

    (availables, route_related)
}

/// Départage les candidats.
///
/// Zéro candidat : rien. Un seul : lui, quels que soient ses flags.
/// Plusieurs : si exactement un est "official", c'est lui ; sinon, parmi
/// les officials (ou tous s'il n'y en a pas), la plus grosse supply LP
/// normalisée gagne, avec la règle qu'un stable (version 5) n'est jamais
/// préféré à un non-stable.
pub fn pick_best(candidates: &[PoolDescriptor], states: &PoolStateMap) -> Option<PoolDescriptor> {
    match candidates.len() {
        0 => return None,
        1 => return Some(candidates[0].clone()),
        _ => {}
    }

    let officials: Vec<&PoolDescriptor> = candidates.iter().filter(|p| p.official).collect();
    if officials.len() == 1 {
        return Some(officials[0].clone());
    }

    let pool: Vec<&PoolDescriptor> = if officials.is_empty() {
        candidates.iter().collect()
    } else {
        officials
    };

    let mut best = pool[0];
    for candidate in &pool[1..] {
        best = prefer(best, candidate, states);
    }
    Some(best.clone())
}

/// La supply LP normalisée d'un candidat ; (0, 0) si son état on-chain
/// n'a pas pu être lu.
fn lp_supply_of(pool: &PoolDescriptor, states: &PoolStateMap) -> (u64, u8) {
    states
        .get(&pool.id)
        .map(|s| (s.lp_supply, s.lp_decimals))
        .unwrap_or((0, 0))
}

/// Préférence entre deux candidats. `a` est le tenant du titre : il est
/// gardé en cas d'égalité.
fn prefer<'a>(a: &'a PoolDescriptor, b: &'a PoolDescriptor, states: &PoolStateMap) -> &'a PoolDescriptor {
    let a_stable = a.version.is_stable();
    let b_stable = b.version.is_stable();
    // Un stable ne bat jamais un non-stable, quelle que soit sa supply.
    if a_stable && !b_stable {
        return b;
    }
    if b_stable && !a_stable {
        return a;
    }

    let (supply_a, decimals_a) = lp_supply_of(a, states);
    let (supply_b, decimals_b) = lp_supply_of(b, states);
    match fraction::cmp_normalized(supply_a, decimals_a, supply_b, decimals_b) {
        Ok(Ordering::Less) => b,
        _ => a,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PoolVersion;
    use crate::routing::ParsedPoolState;

    fn descriptor(base: Pubkey, quote: Pubkey, version: PoolVersion, official: bool) -> PoolDescriptor {
        PoolDescriptor {
            id: Pubkey::new_unique(),
            base_mint: base,
            quote_mint: quote,
            lp_mint: Pubkey::new_unique(),
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            market_id: Pubkey::new_unique(),
            program_id: Pubkey::new_unique(),
            base_decimals: 9,
            quote_decimals: 6,
            lp_decimals: 9,
            version,
            official,
        }
    }

    fn with_supply(states: &mut PoolStateMap, pool: &PoolDescriptor, lp_supply: u64, lp_decimals: u8) {
        states.insert(
            pool.id,
            ParsedPoolState {
                id: pool.id,
                base_mint: pool.base_mint,
                quote_mint: pool.quote_mint,
                base_reserve: 1,
                quote_reserve: 1,
                lp_supply,
                lp_decimals,
                open_time_secs: 0,
                trade_fee_numerator: 25,
                trade_fee_denominator: 10_000,
            },
        );
    }

    #[test]
    fn normalize_accepts_base58_and_rejects_garbage() {
        assert!(normalize_mint(Some("So11111111111111111111111111111111111111112")).is_some());
        assert!(normalize_mint(Some("pas une adresse")).is_none());
        assert!(normalize_mint(None).is_none());
    }

    #[test]
    fn no_matching_pool_yields_empty_result() {
        let catalog = PoolCatalog::default();
        let (availables, route_related) =
            scan_pair(&catalog, &Pubkey::new_unique(), &Pubkey::new_unique());
        assert!(availables.is_empty());
        assert!(route_related.is_empty());
        assert!(pick_best(&availables, &PoolStateMap::new()).is_none());
    }

    #[test]
    fn single_candidate_wins_regardless_of_flags() {
        let m1 = Pubkey::new_unique();
        let m2 = Pubkey::new_unique();
        // Même stable et non-official : seul candidat, donc retenu.
        let only = descriptor(m1, m2, PoolVersion::Stable, false);
        let out = pick_best(&[only.clone()], &PoolStateMap::new()).unwrap();
        assert_eq!(out.id, only.id);
    }

    #[test]
    fn pair_match_ignores_direction() {
        let m1 = Pubkey::new_unique();
        let m2 = Pubkey::new_unique();
        let catalog = PoolCatalog {
            pools: vec![descriptor(m2, m1, PoolVersion::AmmV4, true)],
            clmm_pools: vec![],
        };
        let (availables, _) = scan_pair(&catalog, &m1, &m2);
        assert_eq!(availables.len(), 1);
    }

    #[test]
    fn lone_official_beats_bigger_supply() {
        let m1 = Pubkey::new_unique();
        let m2 = Pubkey::new_unique();
        let official = descriptor(m1, m2, PoolVersion::AmmV4, true);
        let big = descriptor(m1, m2, PoolVersion::AmmV4, false);

        let mut states = PoolStateMap::new();
        with_supply(&mut states, &official, 1_000, 9);
        with_supply(&mut states, &big, 1_000_000_000, 9);

        let out = pick_best(&[official.clone(), big], &states).unwrap();
        assert_eq!(out.id, official.id);
    }

    #[test]
    fn bigger_normalized_supply_wins_among_equals() {
        let m1 = Pubkey::new_unique();
        let m2 = Pubkey::new_unique();
        let small = descriptor(m1, m2, PoolVersion::AmmV4, false);
        let big = descriptor(m1, m2, PoolVersion::AmmV4, false);

        let mut states = PoolStateMap::new();
        // Décimales différentes : c'est bien la supply normalisée qui compte.
        with_supply(&mut states, &small, 5_000_000, 6); // 5.0
        with_supply(&mut states, &big, 6_000_000_000, 9); // 6.0

        let out = pick_best(&[small, big.clone()], &states).unwrap();
        assert_eq!(out.id, big.id);
    }

    #[test]
    fn stable_never_beats_non_stable_on_supply() {
        let m1 = Pubkey::new_unique();
        let m2 = Pubkey::new_unique();
        let stable = descriptor(m1, m2, PoolVersion::Stable, false);
        let standard = descriptor(m1, m2, PoolVersion::AmmV4, false);

        let mut states = PoolStateMap::new();
        with_supply(&mut states, &stable, 1_000_000_000, 9);
        with_supply(&mut states, &standard, 1_000, 9);

        let out = pick_best(&[stable, standard.clone()], &states).unwrap();
        assert_eq!(out.id, standard.id);
    }

    #[test]
    fn two_stables_compare_on_supply() {
        let m1 = Pubkey::new_unique();
        let m2 = Pubkey::new_unique();
        let small = descriptor(m1, m2, PoolVersion::Stable, false);
        let big = descriptor(m1, m2, PoolVersion::Stable, false);

        let mut states = PoolStateMap::new();
        with_supply(&mut states, &small, 1_000, 9);
        with_supply(&mut states, &big, 2_000, 9);

        let out = pick_best(&[small, big.clone()], &states).unwrap();
        assert_eq!(out.id, big.id);
    }

    #[test]
    fn route_related_excludes_pools_entirely_between_middles() {
        use crate::api::ROUTE_MIDDLE_MINTS;
        let m1 = Pubkey::new_unique();
        let m2 = Pubkey::new_unique();
        let wsol = ROUTE_MIDDLE_MINTS[0];
        let usdc = ROUTE_MIDDLE_MINTS[1];

        let catalog = PoolCatalog {
            pools: vec![
                descriptor(m1, wsol, PoolVersion::AmmV4, true), // jambe valide
                descriptor(wsol, usdc, PoolVersion::AmmV4, true), // pivot-pivot, exclu
                descriptor(m1, Pubkey::new_unique(), PoolVersion::AmmV4, true), // hors paire
            ],
            clmm_pools: vec![],
        };
        let (_, route_related) = scan_pair(&catalog, &m1, &m2);
        assert_eq!(route_related.len(), 1);
        assert_eq!(route_related[0].quote_mint, wsol);
    }
}
