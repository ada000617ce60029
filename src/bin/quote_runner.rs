// src/bin/quote_runner.rs
//
// Le runner de cotation : une paire en arguments, et on déroule tout le
// pipeline (catalogue API, graphe de routes, états on-chain, sélection).
// Usage : quote_runner <mint_entrée> <mint_sortie> [montant] [slippage_bps]

use anyhow::{Result, anyhow};
use solana_sdk::pubkey::Pubkey;
use std::env;
use std::str::FromStr;
use std::sync::Arc;

use quoter::config::Config;
use quoter::monitoring::logging;
use quoter::routing::service::QuoterService;

#[tokio::main]
async fn main() -> Result<()> {
    logging::setup_logging();
    println!("--- Lancement du Quote Runner ---");

    let config = Config::load()?;
    let service = Arc::new(QuoterService::from_config(config));

    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 2 {
        return Err(anyhow!(
            "Usage: quote_runner <mint_entrée> <mint_sortie> [montant] [slippage_bps]"
        ));
    }
    let input = Pubkey::from_str(&args[0])?;
    let output = Pubkey::from_str(&args[1])?;
    let amount_in: u64 = args.get(2).map(|s| s.parse()).transpose()?.unwrap_or(1_000_000);
    let slippage_bps: u16 = args.get(3).map(|s| s.parse()).transpose()?.unwrap_or(50);

    println!("\n--- Scan de la Paire ---");
    let pair = service
        .find_pool_by_mint_pair(Some(&args[0]), Some(&args[1]))
        .await;
    println!("-> {} pools disponibles.", pair.availables.len());
    println!("-> {} pools de relais.", pair.route_related.len());
    match &pair.best {
        Some(best) => println!(
            "-> Pool par défaut : {} (version {:?}, official: {})",
            best.id, best.version, best.official
        ),
        None => println!("-> Aucun pool par défaut départageable."),
    }

    println!("\n--- Cotation des Routes ---");
    match service
        .get_all_swapable_route_infos(&input, &output, amount_in, slippage_bps)
        .await
    {
        Some(infos) => {
            println!(
                "-> {} routes calculées (heure de chaîne : {} ms).",
                infos.routes.len(),
                infos.chain_time_ms
            );
            for (i, route) in infos.routes.iter().enumerate() {
                let hops = route.pool_keys.len();
                println!(
                    "   #{} : {} -> {} ({} saut{}, prêt: {})",
                    i + 1,
                    route.amount_in,
                    route.amount_out,
                    hops,
                    if hops > 1 { "s" } else { "" },
                    route.pool_ready
                );
            }
            match &infos.selection {
                Some(selection) => {
                    println!(
                        "-> Meilleure route : {} -> {} (min reçu : {}).",
                        selection.best.amount_in,
                        selection.best.amount_out,
                        selection.best.min_amount_out
                    );
                    for start in &selection.start_times {
                        println!(
                            "   [AVERTISSEMENT] Pool {} n'ouvre qu'à {} (ms Unix).",
                            start.pool_id, start.open_time_ms
                        );
                    }
                }
                None => println!("-> Aucune route sélectionnable."),
            }
        }
        None => println!("[AVERTISSEMENT] Cotation impossible (données indisponibles)."),
    }

    Ok(())
}
