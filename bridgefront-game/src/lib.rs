//! Bridgefront Game Engine
//!
//! Deterministic rules engine for Bridgefront, a simultaneous-turn hex
//! strategy game. The engine is a pure state machine: commands go in, a new
//! state comes out. Transport, persistence and rendering live with the host.

pub mod actions;
pub mod block;
pub mod board;
pub mod catalog;
pub mod combat;
pub mod command;
pub mod config;
pub mod constants;
pub mod events;
pub mod ids;
pub mod market;
pub mod modifiers;
pub mod numbers;
pub mod rng;
pub mod round;
pub mod scoring;
pub mod state;
pub mod view;

use std::convert::Infallible;
use std::sync::Arc;

// Re-export commonly used types
pub use actions::{BasicAction, Declaration};
pub use block::{Block, BlockKind};
pub use board::{Board, EdgeKey, HexKey, TileKind};
pub use catalog::{Age, Catalog, CardDef, Targets};
pub use command::{Command, CommandError, SetupChoice, apply_command};
pub use config::{BoardConfig, ConfigError, GameConfig};
pub use events::{EventKind, GameEvent};
pub use ids::{CardId, CardInstanceId, ChampionId, FactionId, ModifierId, PlayerId, UnitId};
pub use market::Bid;
pub use round::phase::{CollectionChoice, CollectionPrompt};
pub use round::session::{GameSession, ReplayError};
pub use round::setup::{LobbySeat, SetupError, new_game};
pub use round::{Phase, RoundStep, SetupStep};
pub use state::{GameState, Player};
pub use view::{GameView, build_view};

/// Source of the content tables a game is created from.
/// Hosts provide this; `BundledLoader` serves the shipped defaults.
pub trait CatalogLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the card, champion and faction catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded.
    fn load_catalog(&self) -> Result<Catalog, Self::Error>;

    /// Load the game configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or parsed.
    fn load_config(&self) -> Result<GameConfig, Self::Error>;
}

/// Loader backed by the catalog compiled into the crate and default config.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledLoader;

impl CatalogLoader for BundledLoader {
    type Error = Infallible;

    fn load_catalog(&self) -> Result<Catalog, Self::Error> {
        Ok(Catalog::load_from_static())
    }

    fn load_config(&self) -> Result<GameConfig, Self::Error> {
        Ok(GameConfig::default())
    }
}

/// Save/load of whole game states.
/// Platform-specific implementations should provide this
pub trait GameStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Save game state
    ///
    /// # Errors
    ///
    /// Returns an error if the game state cannot be saved.
    fn save_game(&self, save_name: &str, game_state: &GameState) -> Result<(), Self::Error>;

    /// Load game state
    ///
    /// # Errors
    ///
    /// Returns an error if the game state cannot be loaded.
    fn load_game(&self, save_name: &str) -> Result<Option<GameState>, Self::Error>;

    /// Delete saved game
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    fn delete_save(&self, save_name: &str) -> Result<(), Self::Error>;
}

/// Entry point for hosts: creates sessions and persists their states.
pub struct GameEngine<L, S>
where
    L: CatalogLoader,
    S: GameStorage,
{
    loader: L,
    storage: S,
}

impl<L, S> GameEngine<L, S>
where
    L: CatalogLoader,
    S: GameStorage,
{
    pub const fn new(loader: L, storage: S) -> Self {
        Self { loader, storage }
    }

    /// Create a game for the lobby and wrap it in a session.
    ///
    /// # Errors
    ///
    /// Returns an error if content cannot be loaded or the lobby is invalid.
    pub fn create_session(&self, lobby: &[LobbySeat], seed: u64) -> anyhow::Result<GameSession> {
        let catalog = self.loader.load_catalog()?;
        let config = self.loader.load_config()?;
        let session = GameSession::new(Arc::new(catalog), Arc::new(config), lobby, seed)?;
        log::info!(
            "created session for {} players (seed {seed}, digest {:016x})",
            lobby.len(),
            session.digest()
        );
        Ok(session)
    }

    /// Save a game state
    ///
    /// # Errors
    ///
    /// Returns an error if the game state cannot be saved.
    pub fn save_game(&self, save_name: &str, game_state: &GameState) -> Result<(), S::Error> {
        self.storage.save_game(save_name, game_state)
    }

    /// Load a game state and reattach a freshly loaded catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the game state cannot be loaded or rehydrated.
    pub fn load_game(&self, save_name: &str) -> anyhow::Result<Option<GameState>> {
        let Some(game_state) = self.storage.load_game(save_name)? else {
            return Ok(None);
        };
        let catalog = self.loader.load_catalog()?;
        Ok(Some(game_state.rehydrate(Arc::new(catalog))))
    }

    /// Delete a saved game.
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    pub fn delete_save(&self, save_name: &str) -> Result<(), S::Error> {
        self.storage.delete_save(save_name)
    }
}

/// Fixtures shared by the unit tests.
#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::actions::effects::recruit;
    use crate::board::layout::capital_slots;
    use crate::board::{Board, HexKey};
    use crate::catalog::Catalog;
    use crate::config::GameConfig;
    use crate::ids::{CardId, CardInstanceId, ChampionId, PlayerId, UnitId};
    use crate::round::setup::{LobbySeat, build_board, new_game};
    use crate::round::{Phase, RoundStep};
    use crate::state::GameState;

    const DUEL: [&str; 2] = ["ironbound", "wayfarers"];

    pub fn game(factions: &[&str], seed: u64) -> GameState {
        let lobby: Vec<LobbySeat> = factions
            .iter()
            .enumerate()
            .map(|(seat, faction)| LobbySeat::new(&format!("p{seat}"), faction))
            .collect();
        new_game(
            Arc::new(Catalog::load_from_static()),
            Arc::new(GameConfig::default()),
            &lobby,
            seed,
        )
        .expect("fixture lobby is valid")
    }

    /// A fresh two-player game waiting on the deck preview.
    pub fn two_player_state() -> GameState {
        game(&DUEL, 7)
    }

    /// Two players on an empty radius-4 board with no modifiers.
    pub fn arena_state(seed: u64) -> GameState {
        let mut state = game(&DUEL, seed);
        state.block = None;
        state.board = Board::with_radius(4).into();
        state.modifiers.clear();
        state.round = 1;
        state.phase = Phase::Round(RoundStep::Action);
        state
    }

    /// Three players at the start of round one's market.
    pub fn market_state(seed: u64) -> GameState {
        let mut state = game(&["ironbound", "wayfarers", "goldhand"], seed);
        state.block = None;
        state.setup.capital_queue.clear();
        state.round = 1;
        state.phase = Phase::Round(RoundStep::Market);
        state
    }

    /// Two players on a built board, round one's action step, full mana and
    /// empty hands. Capitals sit on opposite corners.
    pub fn action_state(seed: u64) -> GameState {
        let mut state = game(&DUEL, seed);
        state.block = None;
        state.setup.capital_queue.clear();
        let slots = capital_slots(state.config.board.radius);
        for (player, slot) in state.players.iter_mut().zip([slots[0], slots[3]]) {
            player.capital = Some(slot);
        }
        build_board(&mut state);
        state.modifiers.clear();
        state.round = 1;
        state.lead_seat = 0;
        state.phase = Phase::Round(RoundStep::Action);
        let mana = state.config.mana_cap;
        for player in &mut state.players {
            player.resources.mana = mana;
            player.deck.hand.clear();
        }
        state
    }

    pub fn place_champion(state: &mut GameState, hex: HexKey, player: &PlayerId, champion: &str) -> UnitId {
        recruit(state, player, hex, &ChampionId::new(champion), CardInstanceId(0))
            .expect("champion fits on the hex")
    }

    /// Move one copy of `card` into the player's hand, preferring copies the
    /// player already owns.
    pub fn hand_card(state: &mut GameState, player: &PlayerId, card: &str) -> CardInstanceId {
        let wanted = CardId::new(card);
        let seated = state.player(player).expect("fixture player");
        let in_hand = seated.deck.hand.clone();
        let owned: Vec<CardInstanceId> = seated
            .deck
            .draw_pile
            .iter()
            .chain(&seated.deck.discard_pile)
            .copied()
            .collect();
        let instance = owned
            .into_iter()
            .chain(state.cards.keys().copied())
            .find(|id| state.cards.get(id) == Some(&wanted) && !in_hand.contains(id))
            .expect("catalog has a copy of the card");
        for p in &mut state.players {
            p.deck.draw_pile.retain(|c| *c != instance);
            p.deck.discard_pile.retain(|c| *c != instance);
            p.deck.hand.retain(|c| *c != instance);
            p.deck.scrapped.retain(|c| *c != instance);
            p.burned.retain(|c| *c != instance);
        }
        for deck in state.decks.values_mut() {
            deck.retain(|c| *c != instance);
        }
        if let Some(p) = state.player_mut(player) {
            p.deck.hand.push(instance);
        }
        instance
    }

    #[test]
    fn action_fixture_places_capitals_and_forces() {
        let state = action_state(1);
        for player in &state.players {
            let capital = player.capital.expect("capital");
            assert_eq!(state.board.units_at(capital, &player.id).len(), 3);
            assert!(player.deck.hand.is_empty());
        }
        assert_ne!(state.players[0].capital, state.players[1].capital);
        assert!(state.modifiers.is_empty());
    }
}
