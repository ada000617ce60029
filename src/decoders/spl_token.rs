// src/decoders/spl_token.rs

use anyhow::Result;
use solana_sdk::pubkey::Pubkey;
use spl_token_2022::{
    extension::StateWithExtensions,
    state::{Account as TokenAccount, Mint},
};

/// Les informations qu'on extrait d'un compte de mint : supply et decimals.
/// C'est ce qui permet de normaliser la supply LP d'un pool.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMint {
    pub address: Pubkey,
    pub supply: u64,
    pub decimals: u8,
}

/// Décode les données brutes d'un compte de mint (SPL Token ou Token-2022).
/// `StateWithExtensions` lit les deux formats indifféremment.
pub fn decode_mint(address: &Pubkey, data: &[u8]) -> Result<DecodedMint> {
    let mint_state = StateWithExtensions::<Mint>::unpack(data)?;
    let base = mint_state.base;
    Ok(DecodedMint {
        address: *address,
        supply: base.supply,
        decimals: base.decimals,
    })
}

/// Le solde d'un compte de token (un vault de pool, typiquement).
pub fn decode_token_amount(data: &[u8]) -> Result<u64> {
    let account_state = StateWithExtensions::<TokenAccount>::unpack(data)?;
    Ok(account_state.base.amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_mint_data() {
        let address = Pubkey::new_unique();
        assert!(decode_mint(&address, &[0u8; 10]).is_err());
    }

    #[test]
    fn rejects_garbage_token_account_data() {
        assert!(decode_token_amount(&[0u8; 10]).is_err());
    }
}
