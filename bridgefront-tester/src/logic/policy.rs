use std::fmt;

use bridgefront_game::actions::effects::buildable_edges;
use bridgefront_game::actions::validate_declaration;
use bridgefront_game::catalog::TargetSpec;
use bridgefront_game::market::validate_bid;
use bridgefront_game::round::phase::{validate_collection, validate_study};
use bridgefront_game::round::setup::starting_bridge_options;
use bridgefront_game::{
    BasicAction, Bid, BlockKind, CardInstanceId, CollectionChoice, CollectionPrompt, Command,
    Declaration, GameState, HexKey, PlayerId, SetupChoice, Targets,
};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Farthest destination considered for path-targeted cards.
const PATH_REACH: u32 = 3;

/// Policy interface for automated players.
pub trait PlayerPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Answer the pending block on behalf of `player`.
    fn respond(&mut self, state: &GameState, player: &PlayerId) -> Option<Command>;
}

/// Built-in gameplay strategies for automated runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GameplayStrategy {
    Passive,
    Greedy,
    Random,
}

impl GameplayStrategy {
    pub const ALL: [Self; 3] = [Self::Passive, Self::Greedy, Self::Random];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            GameplayStrategy::Passive => "passive",
            GameplayStrategy::Greedy => "greedy",
            GameplayStrategy::Random => "random",
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.label().eq_ignore_ascii_case(label.trim()))
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            GameplayStrategy::Passive => "always gives the least committal legal answer",
            GameplayStrategy::Greedy => "spends mana pushing toward the center and buys cheap cards",
            GameplayStrategy::Random => "picks uniformly among legal answers",
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn PlayerPolicy + Send> {
        match self {
            GameplayStrategy::Passive => Box::new(PassivePolicy),
            GameplayStrategy::Greedy => Box::new(GreedyPolicy),
            GameplayStrategy::Random => Box::new(RandomPolicy::new(seed)),
        }
    }
}

impl fmt::Display for GameplayStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The least committal legal answer `player` can give to the pending block.
#[must_use]
pub fn passive_command(state: &GameState, player: &PlayerId) -> Option<Command> {
    let block = state.block.as_ref()?;
    if !block.is_waiting_for(player) {
        return None;
    }
    let player = player.clone();
    let command = match &block.kind {
        BlockKind::DeckPreview => Command::AdvanceSetup { player },
        BlockKind::CapitalDraft { available } => Command::SubmitSetupChoice {
            choice: SetupChoice::Capital {
                hex: *available.first()?,
            },
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

/// Every declaration `player` could legally make right now, `Done` excluded.
#[must_use]
pub fn legal_declarations(state: &GameState, player: &PlayerId) -> Vec<Declaration> {
    let mut candidates = Vec::new();
    if let Some(p) = state.player(player) {
        for card in &p.deck.hand {
            for targets in target_candidates(state, player, *card) {
                candidates.push(Declaration::PlayCard {
                    card: *card,
                    targets,
                });
            }
        }
    }
    for from in state.board.hexes_with_units(player) {
        for to in state.board.neighbors(from) {
            candidates.push(Declaration::Basic {
                action: BasicAction::March {
                    from,
                    to,
                    units: Vec::new(),
                },
            });
        }
    }
    for edge in buildable_edges(state, player) {
        candidates.push(Declaration::Basic {
            action: BasicAction::BuildBridge { edge },
        });
    }
    candidates.push(Declaration::Basic {
        action: BasicAction::CapitalReinforce,
    });
    candidates.retain(|declaration| validate_declaration(state, player, declaration).is_ok());
    candidates
}

fn target_candidates(state: &GameState, player: &PlayerId, card: CardInstanceId) -> Vec<Targets> {
    let Some(def) = state.card_def(card) else {
        return Vec::new();
    };
    let mut own_hexes = state.board.hexes_with_units(player);
    if let Some(capital) = state.player(player).and_then(|p| p.capital) {
        if !own_hexes.contains(&capital) {
            own_hexes.push(capital);
        }
    }
    match def.target {
        TargetSpec::None => vec![Targets::default()],
        TargetSpec::OwnHex => own_hexes
            .into_iter()
            .map(|hex| Targets {
                hex: Some(hex),
                ..Targets::default()
            })
            .collect(),
        TargetSpec::Edge => buildable_edges(state, player)
            .into_iter()
            .chain(state.board.bridges.keys().copied())
            .map(|edge| Targets {
                edge: Some(edge),
                ..Targets::default()
            })
            .collect(),
        TargetSpec::OwnChampion => state
            .board
            .units
            .values()
            .filter(|unit| &unit.owner == player && unit.is_champion())
            .map(|unit| Targets {
                unit: Some(unit.id),
                ..Targets::default()
            })
            .collect(),
        TargetSpec::EnemyUnit => state
            .board
            .units
            .values()
            .filter(|unit| &unit.owner != player)
            .map(|unit| Targets {
                unit: Some(unit.id),
                ..Targets::default()
            })
            .collect(),
        TargetSpec::Path => {
            let mut paths = Vec::new();
            for from in state.board.hexes_with_units(player) {
                for to in state.board.hexes.keys().copied() {
                    let distance = from.distance(to);
                    if (1..=PATH_REACH).contains(&distance) {
                        paths.push(Targets {
                            from: Some(from),
                            to: Some(to),
                            ..Targets::default()
                        });
                    }
                }
            }
            paths
        }
    }
}

fn toward_center(from: HexKey, to: HexKey) -> bool {
    to.ring_distance() < from.ring_distance()
}

fn greedy_score(state: &GameState, player: &PlayerId, declaration: &Declaration) -> Option<i32> {
    match declaration {
        Declaration::PlayCard { .. } => Some(30),
        Declaration::Basic {
            action: BasicAction::March { from, to, .. },
        } => {
            if state.board.has_enemy_at(*to, player) {
                Some(25)
            } else if toward_center(*from, *to) {
                Some(20)
            } else {
                None
            }
        }
        Declaration::Basic {
            action: BasicAction::BuildBridge { edge },
        } => {
            let (a, b) = edge.endpoints();
            let (near, far) = if state.board.has_units_at(a, player) { (a, b) } else { (b, a) };
            toward_center(near, far).then_some(10)
        }
        Declaration::Basic {
            action: BasicAction::CapitalReinforce,
        } => Some(5),
        Declaration::Done => None,
    }
}

struct PassivePolicy;
struct GreedyPolicy;

struct RandomPolicy {
    rng: ChaCha20Rng,
}

impl RandomPolicy {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl PlayerPolicy for PassivePolicy {
    fn name(&self) -> &'static str {
        "Passive"
    }

    fn respond(&mut self, state: &GameState, player: &PlayerId) -> Option<Command> {
        passive_command(state, player)
    }
}

impl PlayerPolicy for GreedyPolicy {
    fn name(&self) -> &'static str {
        "Greedy"
    }

    fn respond(&mut self, state: &GameState, player: &PlayerId) -> Option<Command> {
        let block = state.block.as_ref()?;
        let gold = state.player(player)?.resources.gold;
        let command = match &block.kind {
            BlockKind::MarketBids { .. } => {
                let bid = if gold >= 3 {
                    Bid::Buy { amount: 2 }
                } else if gold >= 1 {
                    Bid::Buy { amount: 1 }
                } else {
                    Bid::Pass { amount: 0 }
                };
                validate_bid(state, player, bid).ok()?;
                Command::SubmitMarketBid {
                    player: player.clone(),
                    bid,
                }
            }
            BlockKind::Declarations { .. } => {
                let mut best: Option<(i32, Declaration)> = None;
                for declaration in legal_declarations(state, player) {
                    if let Some(score) = greedy_score(state, player, &declaration) {
                        if best.as_ref().is_none_or(|(top, _)| score > *top) {
                            best = Some((score, declaration));
                        }
                    }
                }
                Command::SubmitAction {
                    player: player.clone(),
                    declaration: best.map_or(Declaration::Done, |(_, declaration)| declaration),
                }
            }
            BlockKind::Collection { prompts, .. } => {
                let prompts = prompts.get(player).map(Vec::as_slice).unwrap_or_default();
                let choices: Vec<CollectionChoice> = prompts
                    .iter()
                    .map(|prompt| {
                        let CollectionPrompt::Forge { offers, .. } = prompt;
                        offers
                            .first()
                            .map_or(CollectionChoice::Skip, |card| CollectionChoice::Draft { card: *card })
                    })
                    .collect();
                validate_collection(state, player, prompts, &choices).ok()?;
                Command::SubmitCollectionChoices {
                    player: player.clone(),
                    choices,
                }
            }
            _ => return passive_command(state, player),
        };
        Some(command)
    }
}

impl PlayerPolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        "Random"
    }

    fn respond(&mut self, state: &GameState, player: &PlayerId) -> Option<Command> {
        let block = state.block.as_ref()?;
        let me = state.player(player)?;
        let rng = &mut self.rng;
        let command = match &block.kind {
            BlockKind::CapitalDraft { available } => Command::SubmitSetupChoice {
                player: player.clone(),
                choice: SetupChoice::Capital {
                    hex: *available.choose(rng)?,
                },
            },
            BlockKind::StartingBridges { required, .. } => {
                let options = starting_bridge_options(state, player);
                let count = options.len().min(*required as usize);
                Command::SubmitSetupChoice {
                    player: player.clone(),
                    choice: SetupChoice::Bridges {
                        edges: options.choose_multiple(rng, count).copied().collect(),
                    },
                }
            }
            BlockKind::FreeStartingCard { offers, .. } => Command::SubmitSetupChoice {
                player: player.clone(),
                choice: SetupChoice::StartingCard {
                    card: *offers.get(player)?.choose(rng)?,
                },
            },
            BlockKind::QuietStudy { max_discard, .. } => {
                let count = rng.gen_range(0..=(*max_discard as usize).min(me.deck.hand.len()));
                let discard: Vec<CardInstanceId> =
                    me.deck.hand.choose_multiple(rng, count).copied().collect();
                validate_study(state, player, &discard, *max_discard).ok()?;
                Command::SubmitQuietStudy {
                    player: player.clone(),
                    discard,
                }
            }
            BlockKind::MarketBids { .. } => {
                let gold = me.resources.gold;
                let bid = if gold > 0 && rng.gen_bool(0.5) {
                    Bid::Buy {
                        amount: rng.gen_range(1..=gold),
                    }
                } else {
                    Bid::Pass {
                        amount: rng.gen_range(0..=gold.min(2)),
                    }
                };
                validate_bid(state, player, bid).ok()?;
                Command::SubmitMarketBid {
                    player: player.clone(),
                    bid,
                }
            }
            BlockKind::Declarations { .. } => {
                let mut options = legal_declarations(state, player);
                options.push(Declaration::Done);
                Command::SubmitAction {
                    player: player.clone(),
                    declaration: options.choose(rng)?.clone(),
                }
            }
            BlockKind::Collection { prompts, .. } => {
                let prompts = prompts.get(player).map(Vec::as_slice).unwrap_or_default();
                let mut choices = Vec::with_capacity(prompts.len());
                for prompt in prompts {
                    let CollectionPrompt::Forge { offers, .. } = prompt;
                    let choice = match offers.choose(rng) {
                        Some(card) if rng.gen_bool(0.7) => CollectionChoice::Draft { card: *card },
                        _ => CollectionChoice::Skip,
                    };
                    choices.push(choice);
                }
                validate_collection(state, player, prompts, &choices).ok()?;
                Command::SubmitCollectionChoices {
                    player: player.clone(),
                    choices,
                }
            }
            BlockKind::Retreat { options, .. } => {
                let mut edges: Vec<Option<_>> = vec![None];
                if me.resources.mana >= state.config.retreat_mana_cost {
                    edges.extend(options.get(player).into_iter().flatten().copied().map(Some));
                }
                Command::SubmitCombatRetreat {
                    player: player.clone(),
                    edge: *edges.choose(rng)?,
                }
            }
            BlockKind::ScoutReport { revealed, keep, .. } => {
                let count = (*keep as usize).min(revealed.len());
                Command::SubmitScoutReportChoice {
                    player: player.clone(),
                    keep: revealed.choose_multiple(rng, count).copied().collect(),
                }
            }
            BlockKind::DeckPreview | BlockKind::MarketRollOff(_) => {
                return passive_command(state, player);
            }
        };
        Some(command)
    }
}
