// src/decoders/amm_v4.rs

use anyhow::{Result, bail};
use bytemuck::{Pod, Zeroable, from_bytes};
use solana_sdk::pubkey::Pubkey;

/// Ce que le service retient d'un compte de pool AMM V4 : de quoi coter
/// (réserves, frais), décider (open_time, status, supply LP) et rien d'autre.
/// Les réserves et la supply LP sont remplies par une hydratation séparée
/// (lecture des vaults et du mint LP).
#[derive(Debug, Clone)]
pub struct DecodedAmmPool {
    pub address: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub status: u64,
    /// Heure d'ouverture du pool, en secondes Unix. 0 = déjà ouvert.
    pub open_time_secs: u64,
    pub trade_fee_numerator: u64,
    pub trade_fee_denominator: u64,
    // Hydratés après coup.
    pub base_reserve: u64,
    pub quote_reserve: u64,
    pub lp_supply: u64,
    pub lp_decimals: u8,
}

// --- LAYOUT BRUT DU COMPTE (format du programme, ne pas toucher) ---

#[repr(C, packed)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
struct Fees {
    pub min_separate_numerator: u64, pub min_separate_denominator: u64,
    pub trade_fee_numerator: u64, pub trade_fee_denominator: u64,
    pub pnl_numerator: u64, pub pnl_denominator: u64,
    pub swap_fee_numerator: u64, pub swap_fee_denominator: u64,
}

#[repr(C, packed)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
struct OutPutData {
    pub need_take_pnl_coin: u64, pub need_take_pnl_pc: u64,
    pub total_pnl_pc: u64, pub total_pnl_coin: u64,
    pub pool_open_time: u64, pub punish_pc_amount: u64,
    pub punish_coin_amount: u64, pub orderbook_to_init_time: u64,
    pub swap_coin_in_amount: u128, pub swap_pc_out_amount: u128,
    pub swap_take_pc_fee: u64, pub swap_pc_in_amount: u128,
    pub swap_coin_out_amount: u128, pub swap_take_coin_fee: u64,
}

#[repr(C, packed)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
struct AmmInfoData {
    pub status: u64, pub nonce: u64, pub order_num: u64, pub depth: u64,
    pub coin_decimals: u64, pub pc_decimals: u64, pub state: u64,
    pub reset_flag: u64, pub min_size: u64, pub vol_max_cut_ratio: u64,
    pub amount_wave: u64, pub coin_lot_size: u64, pub pc_lot_size: u64,
    pub min_price_multiplier: u64, pub max_price_multiplier: u64,
    pub sys_decimal_value: u64, pub fees: Fees, pub out_put: OutPutData,
    pub token_coin: Pubkey, pub token_pc: Pubkey, pub coin_mint: Pubkey,
    pub pc_mint: Pubkey, pub lp_mint: Pubkey, pub open_orders: Pubkey,
    pub market: Pubkey, pub serum_dex: Pubkey, pub target_orders: Pubkey,
    pub withdraw_queue: Pubkey, pub token_temp_lp: Pubkey,
    pub amm_owner: Pubkey, pub lp_amount: u64, pub client_order_id: u64,
    pub padding: [u64; 2],
}

/// Décode un compte Raydium AMM V4.
pub fn decode_pool(address: &Pubkey, data: &[u8]) -> Result<DecodedAmmPool> {
    if data.len() != std::mem::size_of::<AmmInfoData>() {
        bail!(
            "AMM V4 data length mismatch. Expected {}, got {}.",
            std::mem::size_of::<AmmInfoData>(),
            data.len()
        );
    }
    let raw: &AmmInfoData = from_bytes(data);

    Ok(DecodedAmmPool {
        address: *address,
        base_mint: raw.coin_mint,
        quote_mint: raw.pc_mint,
        lp_mint: raw.lp_mint,
        base_vault: raw.token_coin,
        quote_vault: raw.token_pc,
        base_decimals: raw.coin_decimals as u8,
        quote_decimals: raw.pc_decimals as u8,
        status: raw.status,
        open_time_secs: raw.out_put.pool_open_time,
        trade_fee_numerator: raw.fees.trade_fee_numerator,
        trade_fee_denominator: raw.fees.trade_fee_denominator,
        base_reserve: 0,
        quote_reserve: 0,
        lp_supply: 0,
        lp_decimals: 0,
    })
}
