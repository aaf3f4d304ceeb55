//! Phase pointer and the pump that drives it.
//!
//! The pump repeatedly resolves a ready block or runs the handler for the
//! current phase until a block waits on players or the game is finished.
//! Handlers that open a block move the phase pointer in the same step, so
//! resolving the block hands control straight to the next handler.

pub mod phase;
pub mod session;
pub mod setup;

use serde::{Deserialize, Serialize};

use crate::actions::{self, Progress};
use crate::block::BlockKind;
use crate::combat;
use crate::events::EventKind;
use crate::market;
use crate::state::GameState;

/// Upper bound on pump iterations for a single call.
const PUMP_STEP_BUDGET: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SetupStep {
    DeckPreview,
    CapitalDraft,
    StartingBridges,
    FreeStartingCard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoundStep {
    Reset,
    Study,
    Market,
    Action,
    Sieges,
    Collection,
    Scoring,
    Cleanup,
    AgeUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "step", rename_all = "camelCase")]
pub enum Phase {
    Setup(SetupStep),
    Round(RoundStep),
    Finished,
}

impl Phase {
    #[must_use]
    pub const fn initial() -> Self {
        Self::Setup(SetupStep::DeckPreview)
    }
}

/// Pump a copy of `state` until it rests.
#[must_use]
pub fn pump(state: &GameState) -> GameState {
    let mut next = state.clone();
    pump_in_place(&mut next);
    next
}

pub fn pump_in_place(state: &mut GameState) {
    for _ in 0..PUMP_STEP_BUDGET {
        if !step(state) {
            return;
        }
    }
    log::error!(
        "pump exceeded {PUMP_STEP_BUDGET} steps in {:?} at revision {}",
        state.phase,
        state.revision
    );
}

/// One unit of progress. Returns `false` when the state is at rest.
fn step(state: &mut GameState) -> bool {
    if let Some(block) = state.block.as_ref() {
        if !block.is_ready() {
            return false;
        }
        if let Some(block) = state.block.take() {
            resolve_block(state, block.kind);
        }
        return true;
    }
    match state.phase {
        Phase::Finished => false,
        Phase::Setup(step) => {
            setup::run_step(state, step);
            true
        }
        Phase::Round(step) => {
            run_round_step(state, step);
            true
        }
    }
}

fn resolve_block(state: &mut GameState, kind: BlockKind) {
    log::debug!("resolving block {}", kind.tag());
    match kind {
        BlockKind::DeckPreview => {
            state.push_event(EventKind::SetupAdvanced, serde_json::json!({ "step": "deckPreview" }));
        }
        // Capitals are claimed as each pick is accepted.
        BlockKind::CapitalDraft { .. } => {}
        BlockKind::StartingBridges { submitted, .. } => setup::place_starting_bridges(state, &submitted),
        BlockKind::FreeStartingCard { offers, chosen } => setup::settle_starting_cards(state, &offers, &chosen),
        BlockKind::QuietStudy { submitted, .. } => phase::settle_study(state, &submitted),
        BlockKind::MarketBids { card, bids, .. } => market::resolve_bids(state, card, bids),
        BlockKind::MarketRollOff(roll_off) => market::resolve_roll_off(state, roll_off),
        BlockKind::Declarations { declarations } => {
            state.push_event(
                EventKind::DeclarationsLocked,
                serde_json::json!({ "count": declarations.len() }),
            );
            let resolution = actions::build_resolution(state, declarations);
            state.resolution = Some(resolution);
        }
        BlockKind::Collection { prompts, choices } => phase::settle_collection(state, &prompts, &choices),
        BlockKind::Retreat { battle, choices, .. } => {
            combat::resolve_retreat_choices(state, &battle, &choices);
        }
        BlockKind::ScoutReport {
            player,
            revealed,
            kept,
            ..
        } => {
            let kept = kept.unwrap_or_default();
            actions::effects::resolve_scout(state, &player, &revealed, &kept);
        }
    }
}

fn set_round_step(state: &mut GameState, step: RoundStep) {
    log::debug!("round {} -> {step:?}", state.round);
    state.phase = Phase::Round(step);
}

fn run_round_step(state: &mut GameState, step: RoundStep) {
    match step {
        RoundStep::Reset => {
            phase::reset_round(state);
            set_round_step(state, RoundStep::Study);
        }
        RoundStep::Study => {
            phase::open_study(state);
            set_round_step(state, RoundStep::Market);
        }
        RoundStep::Market => {
            if !state.market.dealt {
                market::deal_row(state);
            }
            if !market::open_next_bid(state) {
                market::close_market(state);
                set_round_step(state, RoundStep::Action);
            }
        }
        RoundStep::Action => {
            if actions::continue_resolution(state) == Progress::Blocked {
                return;
            }
            let eligible = actions::eligible_players(state);
            if eligible.is_empty() {
                set_round_step(state, RoundStep::Sieges);
            } else {
                state.block = Some(crate::block::Block::new(
                    eligible,
                    BlockKind::Declarations {
                        declarations: std::collections::BTreeMap::new(),
                    },
                ));
            }
        }
        RoundStep::Sieges => {
            if let Some(battle) = phase::next_siege(state) {
                // A `None` report means the battle waits on retreat choices.
                let _ = combat::begin_battle(state, battle);
            } else {
                state.sieges_fought.clear();
                set_round_step(state, RoundStep::Collection);
            }
        }
        RoundStep::Collection => {
            phase::collect_income(state);
            phase::open_forge_prompts(state);
            set_round_step(state, RoundStep::Scoring);
        }
        RoundStep::Scoring => {
            crate::scoring::update_scores(state);
            if let Some(winner) = crate::scoring::determine_winner(state) {
                state.push_event(
                    EventKind::GameWon,
                    serde_json::json!({ "winner": winner, "round": state.round }),
                );
                log::debug!("{winner} wins in round {}", state.round);
                state.winner = Some(winner);
                state.phase = Phase::Finished;
            } else {
                set_round_step(state, RoundStep::Cleanup);
            }
        }
        RoundStep::Cleanup => {
            crate::modifiers::expire_end_of_round(state);
            state.board_mut().cleanup_bridges();
            state.resolution = None;
            set_round_step(state, RoundStep::AgeUpdate);
        }
        RoundStep::AgeUpdate => {
            let current = state.config.age_for_round(state.round);
            let next = state.config.age_for_round(state.round + 1);
            if current != next {
                state.push_event(
                    EventKind::AgeAdvanced,
                    serde_json::json!({ "from": current, "to": next }),
                );
            }
            set_round_step(state, RoundStep::Reset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::two_player_state;

    #[test]
    fn pump_is_idempotent_at_rest() {
        let state = two_player_state();
        let once = pump(&state);
        let twice = pump(&once);
        assert_eq!(once, twice);
        assert_eq!(once.digest(), state.digest());
    }

    #[test]
    fn phase_serializes_adjacently_tagged() {
        let json = serde_json::to_value(Phase::Round(RoundStep::AgeUpdate)).unwrap();
        assert_eq!(json, serde_json::json!({ "phase": "round", "step": "ageUpdate" }));
        let back: Phase = serde_json::from_value(serde_json::json!({ "phase": "finished" })).unwrap();
        assert_eq!(back, Phase::Finished);
    }
}
