// src/routing/selector.rs
//
// Le départage final d'une liste de routes cotées. Volontairement simple :
// on fait confiance à l'ordre du moteur, on ne distingue que "échangeable
// maintenant" et "pas encore ouvert".

use crate::routing::{BestRouteSelection, ComputedRoute, PoolStartTime, PoolStateMap};

/// Choisit la route à présenter.
///
/// 1. Liste vide : rien.
/// 2. La première route déjà échangeable gagne, sans autre classement.
/// 3. Aucune prête et pas d'états de pools : la première, au mieux.
/// 4. Sinon la première quand même, mais on collecte les heures
///    d'ouverture futures de ses pools non concentrés (secondes on-chain
///    converties en millisecondes) pour que l'appelant puisse afficher
///    "ouvre dans X heures".
pub fn best_calc_result(
    routes: &[ComputedRoute],
    pool_states: Option<&PoolStateMap>,
    chain_time_ms: i64,
) -> Option<BestRouteSelection> {
    if routes.is_empty() {
        return None;
    }

    if let Some(ready) = routes.iter().find(|r| r.pool_ready) {
        return Some(BestRouteSelection {
            best: ready.clone(),
            start_times: Vec::new(),
        });
    }

    let first = &routes[0];
    let Some(states) = pool_states else {
        return Some(BestRouteSelection {
            best: first.clone(),
            start_times: Vec::new(),
        });
    };

    let mut start_times = Vec::new();
    for key in first.pool_keys.iter().filter(|k| !k.version.is_clmm()) {
        let Some(state) = states.get(&key.id) else { continue };
        let open_time_ms = (state.open_time_secs as i64).saturating_mul(1000);
        if open_time_ms > chain_time_ms {
            start_times.push(PoolStartTime { pool_id: key.id, open_time_ms });
        }
    }

    Some(BestRouteSelection {
        best: first.clone(),
        start_times,
    })
}
