// DANS : src/events/mod.rs
//
// Le bus d'évènements qui remplace le couplage implicite "une vue change,
// un effet recharge". Les producteurs (wallet, écran de liquidité, écran
// de swap, réglages) émettent ; le service écoute et vide ou réchauffe ses
// caches en conséquence.

use solana_sdk::pubkey::Pubkey;
use tokio::sync::broadcast;

/// Les évènements qui pilotent les caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshEvent {
    /// Le wallet a changé ou a été rafraîchi.
    WalletRefresh,
    /// L'écran de liquidité demande des données fraîches.
    LiquidityRefresh,
    /// L'écran de swap demande des données fraîches.
    SwapRefresh,
    /// L'origine de l'API a changé (mainnet <-> devnet) : tout est invalide.
    ApiEndpointChange,
    /// L'utilisateur vient de choisir une paire : on peut préchauffer.
    PairSelected { input: Pubkey, output: Pubkey },
}

/// Un émetteur/abonneur broadcast. Cloner le bus clone l'émetteur ; chaque
/// abonné reçoit sa propre file.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RefreshEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.sender.subscribe()
    }

    /// Émet sans se soucier du nombre d'abonnés (zéro abonné n'est pas une
    /// erreur : personne n'écoutait, c'est tout).
    pub fn emit(&self, event: RefreshEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
