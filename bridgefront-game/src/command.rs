//! Command gateway: validate one inbound command against the pending block,
//! record it, then pump.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::{self, Declaration};
use crate::block::BlockKind;
use crate::board::{EdgeKey, HexKey};
use crate::constants::HOST_SEAT;
use crate::ids::{CardInstanceId, PlayerId};
use crate::market::{self, Bid};
use crate::round::{self, phase, setup};
use crate::round::phase::CollectionChoice;
use crate::state::GameState;

/// Answer to one of the setup prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SetupChoice {
    Capital { hex: HexKey },
    Bridges { edges: Vec<EdgeKey> },
    StartingCard { card: CardInstanceId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    SubmitSetupChoice {
        player: PlayerId,
        choice: SetupChoice,
    },
    AdvanceSetup {
        player: PlayerId,
    },
    SubmitQuietStudy {
        player: PlayerId,
        #[serde(default)]
        discard: Vec<CardInstanceId>,
    },
    SubmitAction {
        player: PlayerId,
        declaration: Declaration,
    },
    SubmitMarketBid {
        player: PlayerId,
        bid: Bid,
    },
    SubmitMarketRollOff {
        player: PlayerId,
    },
    SubmitCollectionChoices {
        player: PlayerId,
        choices: Vec<CollectionChoice>,
    },
    SubmitCombatRetreat {
        player: PlayerId,
        #[serde(default)]
        edge: Option<EdgeKey>,
    },
    SubmitScoutReportChoice {
        player: PlayerId,
        keep: Vec<CardInstanceId>,
    },
}

impl Command {
    #[must_use]
    pub const fn player(&self) -> &PlayerId {
        match self {
            Self::SubmitSetupChoice { player, .. }
            | Self::AdvanceSetup { player }
            | Self::SubmitQuietStudy { player, .. }
            | Self::SubmitAction { player, .. }
            | Self::SubmitMarketBid { player, .. }
            | Self::SubmitMarketRollOff { player }
            | Self::SubmitCollectionChoices { player, .. }
            | Self::SubmitCombatRetreat { player, .. }
            | Self::SubmitScoutReportChoice { player, .. } => player,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SubmitSetupChoice { .. } => "SubmitSetupChoice",
            Self::AdvanceSetup { .. } => "AdvanceSetup",
            Self::SubmitQuietStudy { .. } => "SubmitQuietStudy",
            Self::SubmitAction { .. } => "SubmitAction",
            Self::SubmitMarketBid { .. } => "SubmitMarketBid",
            Self::SubmitMarketRollOff { .. } => "SubmitMarketRollOff",
            Self::SubmitCollectionChoices { .. } => "SubmitCollectionChoices",
            Self::SubmitCombatRetreat { .. } => "SubmitCombatRetreat",
            Self::SubmitScoutReportChoice { .. } => "SubmitScoutReportChoice",
        }
    }
}

/// Reasons a command is rejected. A rejected command leaves the state untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("no decision is pending")]
    NoBlock,
    #[error("{command} does not answer the pending {block} decision")]
    WrongBlock {
        command: &'static str,
        block: &'static str,
    },
    #[error("{0} is not expected to answer the pending decision")]
    NotWaitingFor(PlayerId),
    #[error("only the host may advance setup")]
    NotHost,
    #[error("cannot afford {mana} mana and {gold} gold")]
    Unaffordable { mana: u32, gold: u32 },
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("invalid bid: {0}")]
    InvalidBid(String),
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    #[error("the game is over")]
    GameOver,
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
}

/// Apply one command and pump until the next block.
///
/// # Errors
///
/// Returns `CommandError` when the command does not fit the pending block;
/// the input state stands unchanged.
pub fn apply_command(state: &GameState, command: &Command) -> Result<GameState, CommandError> {
    let mut next = state.clone();
    accept(&mut next, command)?;
    next.revision += 1;
    round::pump_in_place(&mut next);
    Ok(next)
}

fn wrong_block(command: &Command, kind: &BlockKind) -> CommandError {
    CommandError::WrongBlock {
        command: command.name(),
        block: kind.tag(),
    }
}

fn accept(state: &mut GameState, command: &Command) -> Result<(), CommandError> {
    if state.is_finished() {
        return Err(CommandError::GameOver);
    }
    let player = command.player().clone();
    if state.player(&player).is_none() {
        return Err(CommandError::UnknownPlayer(player));
    }
    let Some(mut block) = state.block.take() else {
        return Err(CommandError::NoBlock);
    };
    let result = if !answers(command, &block.kind) {
        Err(wrong_block(command, &block.kind))
    } else if matches!(command, Command::AdvanceSetup { .. }) && state.seat_of(&player) != Some(HOST_SEAT) {
        Err(CommandError::NotHost)
    } else if !block.is_waiting_for(&player) {
        Err(CommandError::NotWaitingFor(player.clone()))
    } else {
        record(state, &mut block.kind, command, &player).map(|()| block.answered(&player))
    };
    state.block = Some(block);
    result
}

/// Whether `command` is the kind of answer `kind` asks for.
fn answers(command: &Command, kind: &BlockKind) -> bool {
    matches!(
        (command, kind),
        (Command::AdvanceSetup { .. }, BlockKind::DeckPreview)
            | (
                Command::SubmitSetupChoice {
                    choice: SetupChoice::Capital { .. },
                    ..
                },
                BlockKind::CapitalDraft { .. }
            )
            | (
                Command::SubmitSetupChoice {
                    choice: SetupChoice::Bridges { .. },
                    ..
                },
                BlockKind::StartingBridges { .. }
            )
            | (
                Command::SubmitSetupChoice {
                    choice: SetupChoice::StartingCard { .. },
                    ..
                },
                BlockKind::FreeStartingCard { .. }
            )
            | (Command::SubmitQuietStudy { .. }, BlockKind::QuietStudy { .. })
            | (Command::SubmitMarketBid { .. }, BlockKind::MarketBids { .. })
            | (Command::SubmitMarketRollOff { .. }, BlockKind::MarketRollOff(_))
            | (Command::SubmitAction { .. }, BlockKind::Declarations { .. })
            | (Command::SubmitCollectionChoices { .. }, BlockKind::Collection { .. })
            | (Command::SubmitCombatRetreat { .. }, BlockKind::Retreat { .. })
            | (Command::SubmitScoutReportChoice { .. }, BlockKind::ScoutReport { .. })
    )
}

fn record(
    state: &mut GameState,
    kind: &mut BlockKind,
    command: &Command,
    player: &PlayerId,
) -> Result<(), CommandError> {
    match (command, kind) {
        (Command::AdvanceSetup { .. }, BlockKind::DeckPreview)
        | (Command::SubmitMarketRollOff { .. }, BlockKind::MarketRollOff(_)) => Ok(()),
        (
            Command::SubmitSetupChoice {
                choice: SetupChoice::Capital { hex },
                ..
            },
            BlockKind::CapitalDraft { available },
        ) => {
            if !available.contains(hex) {
                return Err(CommandError::InvalidSelection(format!(
                    "capital slot {hex} is not available"
                )));
            }
            setup::claim_capital(state, player, *hex);
            Ok(())
        }
        (
            Command::SubmitSetupChoice {
                choice: SetupChoice::Bridges { edges },
                ..
            },
            BlockKind::StartingBridges {
                required,
                submitted,
            },
        ) => {
            setup::validate_starting_bridges(state, player, edges, *required)?;
            submitted.insert(player.clone(), edges.clone());
            Ok(())
        }
        (
            Command::SubmitSetupChoice {
                choice: SetupChoice::StartingCard { card },
                ..
            },
            BlockKind::FreeStartingCard { offers, chosen },
        ) => {
            let offered = offers
                .get(player)
                .is_some_and(|cards| cards.contains(card));
            if !offered {
                return Err(CommandError::InvalidSelection(format!(
                    "card {card} was not offered"
                )));
            }
            chosen.insert(player.clone(), *card);
            Ok(())
        }
        (
            Command::SubmitQuietStudy { discard, .. },
            BlockKind::QuietStudy {
                max_discard,
                submitted,
            },
        ) => {
            phase::validate_study(state, player, discard, *max_discard)?;
            submitted.insert(player.clone(), discard.clone());
            Ok(())
        }
        (Command::SubmitMarketBid { bid, .. }, BlockKind::MarketBids { bids, .. }) => {
            market::validate_bid(state, player, *bid)?;
            bids.insert(player.clone(), *bid);
            Ok(())
        }
        (
            Command::SubmitAction { declaration, .. },
            BlockKind::Declarations { declarations },
        ) => {
            let cost = actions::validate_declaration(state, player, declaration)?;
            actions::pay_declaration(state, player, declaration, cost);
            declarations.insert(player.clone(), declaration.clone());
            Ok(())
        }
        (
            Command::SubmitCollectionChoices { choices: answer, .. },
            BlockKind::Collection { prompts, choices },
        ) => {
            let mine = prompts.get(player).map(Vec::as_slice).unwrap_or_default();
            phase::validate_collection(state, player, mine, answer)?;
            choices.insert(player.clone(), answer.clone());
            Ok(())
        }
        (
            Command::SubmitCombatRetreat { edge, .. },
            BlockKind::Retreat {
                options, choices, ..
            },
        ) => {
            if let Some(edge) = edge {
                let allowed = options
                    .get(player)
                    .is_some_and(|exits| exits.contains(edge));
                if !allowed {
                    return Err(CommandError::InvalidTarget(format!(
                        "{edge} is not a retreat exit"
                    )));
                }
                let cost = state.config.retreat_mana_cost;
                let mana = state.player(player).map_or(0, |p| p.resources.mana);
                if mana < cost {
                    return Err(CommandError::Unaffordable { mana: cost, gold: 0 });
                }
                if let Some(p) = state.player_mut(player) {
                    p.resources.mana -= cost;
                }
            }
            choices.insert(player.clone(), *edge);
            Ok(())
        }
        (
            Command::SubmitScoutReportChoice { keep, .. },
            BlockKind::ScoutReport {
                revealed,
                keep: limit,
                kept,
                ..
            },
        ) => {
            actions::effects::validate_scout_keep(revealed, *limit, keep)?;
            *kept = Some(keep.clone());
            Ok(())
        }
        (command, kind) => Err(wrong_block(command, kind)),
    }
}
