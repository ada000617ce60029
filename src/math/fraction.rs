// src/math/fraction.rs
//
// Comparaisons exactes de quantités financières. Tout est en entiers :
// les flottants n'apparaissent jamais dans une décision de sélection.

use std::cmp::Ordering;

use anyhow::{Result, bail};
use fixed::types::U64F64;

/// 10^exp en u128. Les décimales SPL sont bornées, mais on se protège
/// quand même contre un exposant absurde venu d'un compte corrompu.
pub fn pow10(exp: u8) -> Result<u128> {
    if exp > 38 {
        bail!("Exposant décimal hors limites: {}", exp);
    }
    Ok(10u128.pow(exp as u32))
}

/// Compare deux montants exprimés dans des décimales différentes, comme
/// s'ils étaient normalisés en unités "humaines" (montant / 10^decimals).
/// On évite la division : produit en croix en u128, exact.
pub fn cmp_normalized(amount_a: u64, decimals_a: u8, amount_b: u64, decimals_b: u8) -> Result<Ordering> {
    let lhs = (amount_a as u128).checked_mul(pow10(decimals_b)?);
    let rhs = (amount_b as u128).checked_mul(pow10(decimals_a)?);
    match (lhs, rhs) {
        (Some(l), Some(r)) => Ok(l.cmp(&r)),
        _ => bail!("Overflow dans la comparaison normalisée"),
    }
}

/// Prix en virgule fixe : quantité de sortie par unité d'entrée.
/// Retourne None si l'entrée est nulle.
pub fn price_per_unit(amount_in: u64, amount_out: u64) -> Option<U64F64> {
    if amount_in == 0 {
        return None;
    }
    U64F64::from_num(amount_out).checked_div(U64F64::from_num(amount_in))
}
