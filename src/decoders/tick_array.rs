// src/decoders/tick_array.rs

use anyhow::{Result, bail};
use bytemuck::{Pod, Zeroable, from_bytes};
use solana_sdk::pubkey::Pubkey;

// Constantes tirées directement du code source de Raydium.
pub const TICK_ARRAY_SIZE: usize = 60;
pub const REWARD_NUM: usize = 3;

#[repr(C, packed)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, Default)]
pub struct TickState {
    pub tick: i32,
    pub liquidity_net: i128,
    pub liquidity_gross: u128,
    pub fee_growth_outside_0_x64: u128,
    pub fee_growth_outside_1_x64: u128,
    pub reward_growths_outside_x64: [u128; REWARD_NUM],
    pub padding: [u32; 13],
}

#[repr(C, packed)]
#[derive(Clone, Copy, Debug)]
pub struct TickArrayState {
    pub pool_id: Pubkey,
    pub start_tick_index: i32,
    pub ticks: [TickState; TICK_ARRAY_SIZE],
    pub initialized_tick_count: u8,
    pub recent_epoch: u64,
    pub padding: [u8; 107],
}

// Implémentation manuelle pour bytemuck, car la struct contient un grand tableau.
unsafe impl Zeroable for TickArrayState {}
unsafe impl Pod for TickArrayState {}

/// Le résumé qu'on garde en cache : assez pour savoir si la liquidité
/// autour du tick courant est lisible, sans retenir les 60 ticks.
#[derive(Debug, Clone)]
pub struct TickArraySnapshot {
    pub address: Pubkey,
    pub pool_id: Pubkey,
    pub start_tick_index: i32,
    pub initialized_tick_count: u8,
}

/// Calcule l'adresse d'un compte TickArray (PDA).
pub fn get_tick_array_address(pool_id: &Pubkey, start_tick_index: i32, program_id: &Pubkey) -> Pubkey {
    let (pda, _) = Pubkey::find_program_address(
        &[
            b"tick_array",
            &pool_id.to_bytes(),
            &start_tick_index.to_be_bytes(),
        ],
        program_id,
    );
    pda
}

/// Calcule le tick de départ de l'array contenant `tick_index`.
/// Même arithmétique que le programme, y compris pour les ticks négatifs.
pub fn get_start_tick_index(tick_index: i32, tick_spacing: u16) -> i32 {
    let ticks_in_array = (TICK_ARRAY_SIZE as i32) * (tick_spacing as i32);
    let mut start = tick_index / ticks_in_array;
    if tick_index < 0 && tick_index % ticks_in_array != 0 {
        start -= 1;
    }
    start * ticks_in_array
}

/// Décode un compte TickArray (layout Anchor, 8 bytes de discriminator).
pub fn decode_tick_array(address: &Pubkey, data: &[u8]) -> Result<TickArraySnapshot> {
    let data_slice = data.get(8..).unwrap_or(&[]);
    if data_slice.len() < std::mem::size_of::<TickArrayState>() {
        bail!(
            "TickArray trop court. Attendu {}, reçu {}.",
            std::mem::size_of::<TickArrayState>(),
            data_slice.len()
        );
    }
    let raw: &TickArrayState = from_bytes(&data_slice[..std::mem::size_of::<TickArrayState>()]);
    Ok(TickArraySnapshot {
        address: *address,
        pool_id: raw.pool_id,
        start_tick_index: raw.start_tick_index,
        initialized_tick_count: raw.initialized_tick_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_tick_index_rounds_toward_negative_infinity() {
        // spacing 10 -> 600 ticks par array
        assert_eq!(get_start_tick_index(0, 10), 0);
        assert_eq!(get_start_tick_index(599, 10), 0);
        assert_eq!(get_start_tick_index(600, 10), 600);
        assert_eq!(get_start_tick_index(-1, 10), -600);
        assert_eq!(get_start_tick_index(-600, 10), -600);
        assert_eq!(get_start_tick_index(-601, 10), -1200);
    }

    #[test]
    fn rejects_short_account() {
        let address = Pubkey::new_unique();
        assert!(decode_tick_array(&address, &[0u8; 64]).is_err());
    }
}
