// src/decoders/clmm_pool.rs

use anyhow::{Result, bail};
use bytemuck::{Pod, Zeroable, from_bytes};
use solana_sdk::pubkey::Pubkey;

/// L'état courant d'un pool concentré, réduit à ce qui sert au routage :
/// le prix (sqrt), le tick courant et l'espacement pour dériver les tick
/// arrays à lire.
#[derive(Debug, Clone)]
pub struct DecodedClmmPool {
    pub address: Pubkey,
    pub program_id: Pubkey,
    pub amm_config: Pubkey,
    pub mint_a: Pubkey,
    pub mint_b: Pubkey,
    pub mint_a_decimals: u8,
    pub mint_b_decimals: u8,
    pub tick_spacing: u16,
    pub liquidity: u128,
    pub sqrt_price_x64: u128,
    pub tick_current: i32,
}

// Préfixe du layout Anchor `PoolState`, après le discriminator.
#[repr(C, packed)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
struct PoolStateData {
    pub bump: [u8; 1],
    pub amm_config: Pubkey,
    pub owner: Pubkey,
    pub token_mint_0: Pubkey,
    pub token_mint_1: Pubkey,
    pub token_vault_0: Pubkey,
    pub token_vault_1: Pubkey,
    pub observation_key: Pubkey,
    pub mint_decimals_0: u8,
    pub mint_decimals_1: u8,
    pub tick_spacing: u16,
    pub liquidity: u128,
    pub sqrt_price_x64: u128,
    pub tick_current: i32,
}

/// Décode un compte PoolState du programme CLMM de Raydium.
pub fn decode_pool(address: &Pubkey, data: &[u8], program_id: &Pubkey) -> Result<DecodedClmmPool> {
    const DISCRIMINATOR: [u8; 8] = [247, 237, 227, 245, 215, 195, 222, 70];
    if data.get(..8) != Some(&DISCRIMINATOR) {
        bail!("Invalid PoolState discriminator.");
    }
    let data_slice = &data[8..];
    if data_slice.len() < std::mem::size_of::<PoolStateData>() {
        bail!(
            "PoolState trop court. Attendu au moins {}, reçu {}.",
            std::mem::size_of::<PoolStateData>(),
            data_slice.len()
        );
    }
    let raw: &PoolStateData = from_bytes(&data_slice[..std::mem::size_of::<PoolStateData>()]);

    Ok(DecodedClmmPool {
        address: *address,
        program_id: *program_id,
        amm_config: raw.amm_config,
        mint_a: raw.token_mint_0,
        mint_b: raw.token_mint_1,
        mint_a_decimals: raw.mint_decimals_0,
        mint_b_decimals: raw.mint_decimals_1,
        tick_spacing: raw.tick_spacing,
        liquidity: raw.liquidity,
        sqrt_price_x64: raw.sqrt_price_x64,
        tick_current: raw.tick_current,
    })
}
