// DANS: src/math/swap_math.rs

use anyhow::{Result, anyhow};
use spl_math::uint::U256;

/// Simule un swap contre une courbe à produit constant et retourne la
/// quantité de tokens de destination obtenue. Les frais sont exprimés en
/// numérateur/dénominateur, prélevés sur l'input comme le fait le programme.
pub fn constant_product_swap(
    source_amount: u128,
    swap_source_amount: u128,
    swap_destination_amount: u128,
    fee_numerator: u64,
    fee_denominator: u64,
) -> Result<u128> {
    if fee_denominator == 0 {
        return Err(anyhow!("Dénominateur de frais nul"));
    }
    if swap_source_amount == 0 || swap_destination_amount == 0 {
        return Err(anyhow!("Réserves vides, pas de cotation possible"));
    }

    // Frais prélevés sur l'input avant d'entrer dans la courbe.
    let fee = source_amount
        .checked_mul(fee_numerator as u128)
        .ok_or_else(|| anyhow!("Overflow dans le calcul des frais"))?
        / fee_denominator as u128;
    let source_after_fee = source_amount
        .checked_sub(fee)
        .ok_or_else(|| anyhow!("Frais supérieurs à l'input"))?;

    let invariant = swap_source_amount
        .checked_mul(swap_destination_amount)
        .ok_or_else(|| anyhow!("Invariant calculation failed"))?;
    let new_swap_source_amount = swap_source_amount
        .checked_add(source_after_fee)
        .ok_or_else(|| anyhow!("New source amount calculation failed"))?;

    let (new_swap_destination_amount, _) = ceiling_div(invariant, new_swap_source_amount)?;

    let destination_amount_swapped = swap_destination_amount
        .checked_sub(new_swap_destination_amount)
        .ok_or_else(|| anyhow!("Dest amount swapped calculation failed"))?;
    Ok(destination_amount_swapped)
}

// Helper for ceiling division
fn ceiling_div(a: u128, b: u128) -> Result<(u128, u128)> {
    if b == 0 {
        return Err(anyhow!("Division by zero"));
    }
    let mut quotient = a / b;
    let mut remainder = a % b;
    if remainder > 0 {
        quotient += 1;
        remainder = b - remainder;
    }
    Ok((quotient, remainder))
}

/// Cotation "spot" d'un pool concentré à partir de son sqrt_price_x64 :
/// out = in * price, avec price = (sqrt_price_x64)^2 / 2^128.
/// C'est une approximation sans traversée de ticks, suffisante pour
/// ordonner des candidats entre eux.
pub fn clmm_spot_output(
    amount_in: u128,
    sqrt_price_x64: u128,
    a_to_b: bool,
    fee_rate_num: u32,
    fee_rate_denom: u32,
) -> Result<u128> {
    if sqrt_price_x64 == 0 {
        return Err(anyhow!("sqrt_price nul"));
    }
    if fee_rate_denom == 0 {
        return Err(anyhow!("Dénominateur de frais nul"));
    }

    let fee = amount_in
        .checked_mul(fee_rate_num as u128)
        .ok_or_else(|| anyhow!("Overflow dans le calcul des frais"))?
        / fee_rate_denom as u128;
    let amount = amount_in
        .checked_sub(fee)
        .ok_or_else(|| anyhow!("Frais supérieurs à l'input"))?;

    // Les produits intermédiaires dépassent u128 : on passe par U256.
    let sqrt = U256::from(sqrt_price_x64);
    let price_x128 = sqrt
        .checked_mul(sqrt)
        .ok_or_else(|| anyhow!("Overflow sqrt_price^2"))?;

    let out = if a_to_b {
        // prix de A en B : amount * price_x128 >> 128
        U256::from(amount)
            .checked_mul(price_x128)
            .map(|v| v >> 128)
            .ok_or_else(|| anyhow!("Overflow cotation CLMM"))?
    } else {
        // sens inverse : amount / price = (amount << 128) / price_x128
        (U256::from(amount) << 128)
            .checked_div(price_x128)
            .ok_or_else(|| anyhow!("Division par un prix nul"))?
    };

    if out > U256::from(u128::MAX) {
        return Err(anyhow!("Cotation CLMM hors limites"));
    }
    Ok(out.as_u128())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_product_moves_along_the_curve() {
        // Réserves 1_000_000 / 1_000_000, pas de frais : x*y constant.
        let out = constant_product_swap(10_000, 1_000_000, 1_000_000, 0, 1).unwrap();
        // 1_000_000 - ceil(10^12 / 1_010_000) = 9900
        assert_eq!(out, 9900);
    }

    #[test]
    fn constant_product_takes_fee_on_input() {
        let with_fee = constant_product_swap(10_000, 1_000_000, 1_000_000, 25, 10_000).unwrap();
        let without_fee = constant_product_swap(10_000, 1_000_000, 1_000_000, 0, 1).unwrap();
        assert!(with_fee < without_fee);
    }

    #[test]
    fn constant_product_rejects_empty_reserves() {
        assert!(constant_product_swap(10_000, 0, 1_000_000, 25, 10_000).is_err());
    }

    #[test]
    fn clmm_spot_is_symmetric_at_price_one() {
        // sqrt_price = 2^64 représente un prix de 1.0.
        let one_x64 = 1u128 << 64;
        let out = clmm_spot_output(1_000_000, one_x64, true, 0, 1).unwrap();
        assert_eq!(out, 1_000_000);
        let back = clmm_spot_output(out, one_x64, false, 0, 1).unwrap();
        assert_eq!(back, 1_000_000);
    }
}
