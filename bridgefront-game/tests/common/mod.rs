#![allow(dead_code)]

use std::sync::Arc;

use bridgefront_game::board::Board;
use bridgefront_game::market::Bid;
use bridgefront_game::round::setup::starting_bridge_options;
use bridgefront_game::{
    BlockKind, Catalog, Command, Declaration, GameConfig, GameState, LobbySeat, Phase, RoundStep,
    SetupChoice, apply_command, new_game,
};

/// Commands before a driven game is considered stuck.
pub const COMMAND_BUDGET: usize = 5_000;

pub fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::load_from_static())
}

pub fn config() -> Arc<GameConfig> {
    Arc::new(GameConfig::default())
}

pub fn lobby(factions: &[&str]) -> Vec<LobbySeat> {
    factions
        .iter()
        .enumerate()
        .map(|(seat, faction)| LobbySeat::new(&format!("p{seat}"), faction))
        .collect()
}

pub fn new_state(factions: &[&str], seed: u64) -> GameState {
    new_game(catalog(), config(), &lobby(factions), seed).expect("valid lobby")
}

/// Two players on an empty radius-4 board, no block and no modifiers.
pub fn arena(seed: u64) -> GameState {
    let mut state = new_state(&["ironbound", "wayfarers"], seed);
    state.block = None;
    state.board = Board::with_radius(4).into();
    state.modifiers.clear();
    state.round = 1;
    state.phase = Phase::Round(RoundStep::Action);
    state
}

/// The least committal answer for the first player the block waits on.
pub fn passive_command(state: &GameState) -> Option<Command> {
    let block = state.block.as_ref()?;
    let player = block.waiting_for.first()?.clone();
    let command = match &block.kind {
        BlockKind::DeckPreview => Command::AdvanceSetup { player },
        BlockKind::CapitalDraft { available } => Command::SubmitSetupChoice {
            choice: SetupChoice::Capital { hex: *available.first()? },
            player,
        },
        BlockKind::StartingBridges { required, .. } => {
            let edges = starting_bridge_options(state, &player)
                .into_iter()
                .take(*required as usize)
                .collect();
            Command::SubmitSetupChoice {
                player,
                choice: SetupChoice::Bridges { edges },
            }
        }
        BlockKind::FreeStartingCard { offers, .. } => Command::SubmitSetupChoice {
            choice: SetupChoice::StartingCard {
                card: *offers.get(&player)?.first()?,
            },
            player,
        },
        BlockKind::QuietStudy { .. } => Command::SubmitQuietStudy {
            player,
            discard: Vec::new(),
        },
        BlockKind::MarketBids { .. } => Command::SubmitMarketBid {
            player,
            bid: Bid::Pass { amount: 0 },
        },
        BlockKind::MarketRollOff(_) => Command::SubmitMarketRollOff { player },
        BlockKind::Declarations { .. } => Command::SubmitAction {
            player,
            declaration: Declaration::Done,
        },
        BlockKind::Collection { .. } => Command::SubmitCollectionChoices {
            player,
            choices: Vec::new(),
        },
        BlockKind::Retreat { .. } => Command::SubmitCombatRetreat { player, edge: None },
        BlockKind::ScoutReport { revealed, keep, .. } => Command::SubmitScoutReportChoice {
            player,
            keep: revealed.iter().copied().take(*keep as usize).collect(),
        },
    };
    Some(command)
}

/// Drive a game with passive answers until it finishes or stops waiting.
pub fn run_passive(mut state: GameState) -> (GameState, Vec<Command>) {
    let mut history = Vec::new();
    for _ in 0..COMMAND_BUDGET {
        let Some(command) = passive_command(&state) else {
            break;
        };
        state = apply_command(&state, &command).expect("passive answers are always legal");
        history.push(command);
    }
    (state, history)
}
