//! Game creation and the setup steps before round one.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

use crate::block::{Block, BlockKind};
use crate::board::layout::{capital_slots, BoardLayout, StandardLayout};
use crate::board::{EdgeKey, HexKey};
use crate::catalog::{Age, Catalog};
use crate::command::CommandError;
use crate::config::{ConfigError, GameConfig};
use crate::constants::{MAX_PLAYERS, MIN_PLAYERS, RNG_DOMAIN_GAME};
use crate::events::EventKind;
use crate::ids::{CardId, CardInstanceId, FactionId, PlayerId};
use crate::market::return_to_decks;
use crate::modifiers::{attach, Duration, ModifierSource, NewModifier};
use crate::numbers::u32_to_usize;
use crate::rng::RngState;
use crate::round::{pump_in_place, Phase, RoundStep, SetupStep};
use crate::state::{GameState, Player};

/// One lobby seat: who sits there and which faction they play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySeat {
    pub id: PlayerId,
    pub faction: FactionId,
}

impl LobbySeat {
    #[must_use]
    pub fn new(id: &str, faction: &str) -> Self {
        Self {
            id: PlayerId::new(id),
            faction: FactionId::new(faction),
        }
    }
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("games need {min} to {max} players, got {count}")]
    PlayerCount { min: usize, max: usize, count: usize },
    #[error("player id {0:?} is empty or used twice")]
    DuplicatePlayer(PlayerId),
    #[error("unknown faction {0}")]
    UnknownFaction(FactionId),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Create a game and pump it to the deck preview.
///
/// # Errors
///
/// Returns `SetupError` for a bad lobby or an invalid configuration.
pub fn new_game(
    catalog: Arc<Catalog>,
    config: Arc<GameConfig>,
    lobby: &[LobbySeat],
    seed: u64,
) -> Result<GameState, SetupError> {
    config.validate()?;
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&lobby.len()) {
        return Err(SetupError::PlayerCount {
            min: MIN_PLAYERS,
            max: MAX_PLAYERS,
            count: lobby.len(),
        });
    }
    let mut seen = BTreeSet::new();
    for seat in lobby {
        if seat.id.as_str().is_empty() || !seen.insert(seat.id.clone()) {
            return Err(SetupError::DuplicatePlayer(seat.id.clone()));
        }
        if catalog.faction(&seat.faction).is_none() {
            return Err(SetupError::UnknownFaction(seat.faction.clone()));
        }
    }

    let mut rng = RngState::from_seed(seed, RNG_DOMAIN_GAME);
    let mut cards: BTreeMap<CardInstanceId, CardId> = BTreeMap::new();
    let mut mint = |card: &CardId| {
        let id = CardInstanceId(u32::try_from(cards.len() + 1).unwrap_or(u32::MAX));
        cards.insert(id, card.clone());
        id
    };

    let mut players = Vec::with_capacity(lobby.len());
    for (seat, entry) in lobby.iter().enumerate() {
        let mut player = Player::new(entry.id.clone(), seat, entry.faction.clone(), config.starting_gold);
        let starter: Vec<CardInstanceId> = catalog
            .faction(&entry.faction)
            .map(|faction| faction.starter_deck.iter().map(&mut mint).collect())
            .unwrap_or_default();
        let (shuffled, next) = rng.shuffle(starter);
        rng = next;
        player.deck.draw_pile = shuffled;
        players.push(player);
    }

    let mut decks = BTreeMap::new();
    for age in Age::ALL {
        let mut deck = Vec::new();
        for def in catalog.market_cards(age) {
            for _ in 0..def.copies {
                deck.push(mint(&def.id));
            }
        }
        let (shuffled, next) = rng.shuffle(deck);
        rng = next;
        decks.insert(age, shuffled);
    }

    let mut state = GameState::assemble(catalog, config, seed, rng, players, cards, decks);
    state.push_event(
        EventKind::GameCreated,
        serde_json::json!({
            "seed": seed,
            "players": state.player_ids(),
            "cards": state.cards.len(),
        }),
    );
    log::debug!("created game with {} players from seed {seed}", state.players.len());
    pump_in_place(&mut state);
    Ok(state)
}

fn set_setup_step(state: &mut GameState, step: SetupStep) {
    log::debug!("setup -> {step:?}");
    state.phase = Phase::Setup(step);
}

pub(crate) fn run_step(state: &mut GameState, step: SetupStep) {
    match step {
        SetupStep::DeckPreview => {
            let host = state.host().cloned().into_iter().collect();
            state.block = Some(Block::new(host, BlockKind::DeckPreview));
            state.setup.capital_queue = state.player_ids().into_iter().rev().collect();
            set_setup_step(state, SetupStep::CapitalDraft);
        }
        SetupStep::CapitalDraft => {
            if let Some(next) = state.setup.capital_queue.first().cloned() {
                let available = available_capitals(state);
                state.block = Some(Block::new(vec![next], BlockKind::CapitalDraft { available }));
            } else {
                build_board(state);
                set_setup_step(state, SetupStep::StartingBridges);
            }
        }
        SetupStep::StartingBridges => {
            if state.config.starting_bridges > 0 {
                state.block = Some(Block::new(
                    state.player_ids(),
                    BlockKind::StartingBridges {
                        required: state.config.starting_bridges,
                        submitted: BTreeMap::new(),
                    },
                ));
            }
            set_setup_step(state, SetupStep::FreeStartingCard);
        }
        SetupStep::FreeStartingCard => {
            open_starting_card_offers(state);
            log::debug!("setup complete");
            state.phase = Phase::Round(RoundStep::Reset);
        }
    }
}

/// Corner slots nobody has claimed yet.
#[must_use]
pub fn available_capitals(state: &GameState) -> Vec<HexKey> {
    capital_slots(state.config.board.radius)
        .into_iter()
        .filter(|slot| state.players.iter().all(|p| p.capital != Some(*slot)))
        .collect()
}

/// Record a capital pick and hand the draft to the next player.
pub(crate) fn claim_capital(state: &mut GameState, player: &PlayerId, hex: HexKey) {
    if let Some(p) = state.player_mut(player) {
        p.capital = Some(hex);
    }
    state.setup.capital_queue.retain(|queued| queued != player);
    state.push_event(
        EventKind::CapitalChosen,
        serde_json::json!({ "player": player, "hex": hex }),
    );
}

pub(crate) fn build_board(state: &mut GameState) {
    let capitals: Vec<(PlayerId, HexKey)> = state
        .players
        .iter()
        .filter_map(|p| p.capital.map(|hex| (p.id.clone(), hex)))
        .collect();
    let (board, rng) = StandardLayout.build(&state.config.board, &capitals, &state.rng);
    state.board = Arc::new(board);
    state.rng = rng;

    let starting_forces = state.config.starting_forces;
    for (player, hex) in &capitals {
        state.board_mut().place_forces(*hex, player, starting_forces);
    }
    let passives: Vec<(PlayerId, FactionId, Vec<_>)> = state
        .players
        .iter()
        .filter_map(|p| {
            state
                .catalog()
                .faction(&p.faction)
                .map(|faction| (p.id.clone(), p.faction.clone(), faction.passives.clone()))
        })
        .collect();
    for (player, faction, kinds) in passives {
        for kind in kinds {
            attach(
                state,
                NewModifier {
                    source: ModifierSource::Faction {
                        faction: faction.clone(),
                    },
                    owner: Some(player.clone()),
                    duration: Duration::Permanent,
                    scope: None,
                    kind,
                },
            );
        }
    }
    state.push_event(
        EventKind::BoardBuilt,
        serde_json::json!({
            "radius": state.board.radius,
            "hexes": state.board.hexes.len(),
            "capitals": capitals.iter().map(|(player, hex)| (player.to_string(), hex.to_string())).collect::<BTreeMap<_, _>>(),
        }),
    );
}

/// Edges a player may pick as starting bridges: unbridged edges around their capital.
#[must_use]
pub fn starting_bridge_options(state: &GameState, player: &PlayerId) -> Vec<EdgeKey> {
    let Some(capital) = state.player(player).and_then(|p| p.capital) else {
        return Vec::new();
    };
    state
        .board
        .neighbors(capital)
        .map(|next| EdgeKey::new(capital, next))
        .filter(|edge| state.board.can_build_bridge(*edge))
        .collect()
}

/// Starting bridges must be distinct edges at the player's capital.
///
/// # Errors
///
/// Returns `CommandError::InvalidTarget` for a wrong count or edge.
pub(crate) fn validate_starting_bridges(
    state: &GameState,
    player: &PlayerId,
    edges: &[EdgeKey],
    required: u32,
) -> Result<(), CommandError> {
    let options = starting_bridge_options(state, player);
    let expected = u32_to_usize(required).min(options.len());
    if edges.len() != expected {
        return Err(CommandError::InvalidTarget(format!(
            "expected {expected} starting bridges, got {}",
            edges.len()
        )));
    }
    for (index, edge) in edges.iter().enumerate() {
        if !options.contains(edge) || edges[..index].contains(edge) {
            return Err(CommandError::InvalidTarget(format!(
                "{edge} is not a starting bridge option"
            )));
        }
    }
    Ok(())
}

pub(crate) fn place_starting_bridges(state: &mut GameState, submitted: &BTreeMap<PlayerId, Vec<EdgeKey>>) {
    for player in state.player_ids() {
        let Some(edges) = submitted.get(&player) else {
            continue;
        };
        let placed = edges
            .iter()
            .filter(|edge| state.board_mut().add_bridge(**edge, Some(player.clone()), false))
            .count();
        state.push_event(
            EventKind::StartingBridgesPlaced,
            serde_json::json!({ "player": player, "count": placed }),
        );
    }
}

fn open_starting_card_offers(state: &mut GameState) {
    let choices = u32_to_usize(state.config.free_card_choices);
    let mut offers = BTreeMap::new();
    for player in state.player_ids() {
        let deck = state.decks.entry(Age::I).or_default();
        let take = choices.min(deck.len());
        let offered: Vec<CardInstanceId> = deck.drain(..take).collect();
        if !offered.is_empty() {
            offers.insert(player, offered);
        }
    }
    if offers.is_empty() {
        return;
    }
    let waiting = state
        .player_ids()
        .into_iter()
        .filter(|player| offers.contains_key(player))
        .collect();
    state.block = Some(Block::new(
        waiting,
        BlockKind::FreeStartingCard {
            offers,
            chosen: BTreeMap::new(),
        },
    ));
}

pub(crate) fn settle_starting_cards(
    state: &mut GameState,
    offers: &BTreeMap<PlayerId, Vec<CardInstanceId>>,
    chosen: &BTreeMap<PlayerId, CardInstanceId>,
) {
    for player in state.player_ids() {
        let Some(offered) = offers.get(&player) else {
            continue;
        };
        let pick = chosen.get(&player).copied();
        if let (Some(card), Some(p)) = (pick, state.player_mut(&player)) {
            p.deck.hand.push(card);
        }
        let rest: Vec<CardInstanceId> = offered
            .iter()
            .copied()
            .filter(|card| Some(*card) != pick)
            .collect();
        return_to_decks(state, &rest);
        state.push_event(
            EventKind::StartingCardChosen,
            serde_json::json!({ "player": player, "card": pick.and_then(|card| state.card_id(card).cloned()) }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{apply_command, Command, SetupChoice};

    fn lobby() -> Vec<LobbySeat> {
        vec![LobbySeat::new("ana", "ironbound"), LobbySeat::new("bo", "wayfarers")]
    }

    fn create(seed: u64) -> GameState {
        new_game(
            Arc::new(Catalog::load_from_static()),
            Arc::new(GameConfig::default()),
            &lobby(),
            seed,
        )
        .unwrap()
    }

    #[test]
    fn new_games_validate_the_lobby() {
        let catalog = Arc::new(Catalog::load_from_static());
        let config = Arc::new(GameConfig::default());
        let solo = vec![LobbySeat::new("ana", "ironbound")];
        assert!(matches!(
            new_game(Arc::clone(&catalog), Arc::clone(&config), &solo, 1),
            Err(SetupError::PlayerCount { .. })
        ));
        let twins = vec![LobbySeat::new("ana", "ironbound"), LobbySeat::new("ana", "warhost")];
        assert!(matches!(
            new_game(Arc::clone(&catalog), Arc::clone(&config), &twins, 1),
            Err(SetupError::DuplicatePlayer(_))
        ));
        let stranger = vec![LobbySeat::new("ana", "ironbound"), LobbySeat::new("bo", "pirates")];
        assert!(matches!(
            new_game(catalog, config, &stranger, 1),
            Err(SetupError::UnknownFaction(_))
        ));
    }

    #[test]
    fn new_games_wait_on_the_host_and_are_seed_stable() {
        let state = create(9);
        let block = state.block.as_ref().unwrap();
        assert_eq!(block.kind, BlockKind::DeckPreview);
        assert_eq!(block.waiting_for, vec![PlayerId::new("ana")]);
        assert_eq!(state.players[0].deck.draw_pile.len(), 9);
        assert_eq!(create(9).digest(), state.digest());
        assert_ne!(create(10).digest(), state.digest());
    }

    #[test]
    fn capital_draft_runs_in_reverse_seat_order_then_builds_the_board() {
        let state = create(3);
        let (ana, bo) = (PlayerId::new("ana"), PlayerId::new("bo"));
        let state = apply_command(&state, &Command::AdvanceSetup { player: ana.clone() }).unwrap();
        let slots = capital_slots(state.config.board.radius);

        let early = apply_command(
            &state,
            &Command::SubmitSetupChoice {
                player: ana.clone(),
                choice: SetupChoice::Capital { hex: slots[0] },
            },
        );
        assert!(matches!(early, Err(CommandError::NotWaitingFor(_))));

        let state = apply_command(
            &state,
            &Command::SubmitSetupChoice {
                player: bo.clone(),
                choice: SetupChoice::Capital { hex: slots[0] },
            },
        )
        .unwrap();
        let taken = apply_command(
            &state,
            &Command::SubmitSetupChoice {
                player: ana.clone(),
                choice: SetupChoice::Capital { hex: slots[0] },
            },
        );
        assert!(matches!(taken, Err(CommandError::InvalidSelection(_))));

        let state = apply_command(
            &state,
            &Command::SubmitSetupChoice {
                player: ana.clone(),
                choice: SetupChoice::Capital { hex: slots[3] },
            },
        )
        .unwrap();
        assert_eq!(state.board.units_at(slots[3], &ana).len(), 3);
        assert_eq!(state.board.units_at(slots[0], &bo).len(), 3);
        assert!(!state.modifiers.is_empty(), "faction passives attached");
        let block = state.block.as_ref().unwrap();
        assert_eq!(block.kind.tag(), "setup.startingBridges");
        assert_eq!(starting_bridge_options(&state, &ana).len(), 3);
    }
}
