use std::collections::BTreeMap;
use std::sync::Arc;

use bridgefront_game::{
    Catalog, Command, CommandError, GameConfig, GameSession, LobbySeat, PlayerId, ReplayError,
    SetupError,
};
use thiserror::Error;

use crate::logic::policy::{GameplayStrategy, PlayerPolicy, passive_command};

/// Faction rotation used to seat automated players.
pub const FACTIONS: [&str; 4] = ["ironbound", "wayfarers", "goldhand", "warhost"];

/// Accepted commands allowed before a game counts as stuck.
pub const DEFAULT_MAX_COMMANDS: usize = 20_000;

/// Configuration for a simulation session.
#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub seed: u64,
    pub players: usize,
    pub strategy: GameplayStrategy,
    pub max_commands: usize,
}

impl SimulationConfig {
    #[must_use]
    pub fn new(strategy: GameplayStrategy, players: usize, seed: u64) -> Self {
        Self {
            seed,
            players,
            strategy,
            max_commands: DEFAULT_MAX_COMMANDS,
        }
    }

    #[must_use]
    pub fn with_max_commands(mut self, max_commands: usize) -> Self {
        self.max_commands = max_commands;
        self
    }

    /// Seats `p0..pN` with factions taken in rotation.
    #[must_use]
    pub fn lobby(&self) -> Vec<LobbySeat> {
        (0..self.players)
            .map(|seat| LobbySeat::new(&format!("p{seat}"), FACTIONS[seat % FACTIONS.len()]))
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("game setup failed: {0}")]
    Setup(#[from] SetupError),
    #[error("no player can answer the pending {block} decision")]
    Stalled { block: &'static str },
    #[error("fallback answer for {player} was rejected: {source}")]
    Rejected {
        player: PlayerId,
        #[source]
        source: CommandError,
    },
    #[error("game did not finish within {0} commands")]
    CommandBudget(usize),
    #[error("replay diverged: {0}")]
    Replay(#[from] ReplayError),
    #[error("replayed digest {replayed:016x} differs from live digest {live:016x}")]
    DigestMismatch { live: u64, replayed: u64 },
}

/// Outcome of one automated game.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub commands: usize,
    pub rejected: usize,
    pub rounds: u32,
    pub finished: bool,
    pub winner: Option<PlayerId>,
    pub scores: BTreeMap<PlayerId, u32>,
    pub events: u64,
    pub digest: u64,
}

/// Drives one game to completion with a policy per seat.
pub struct SimulationSession {
    config: SimulationConfig,
    catalog: Arc<Catalog>,
    game_config: Arc<GameConfig>,
    session: GameSession,
    policies: BTreeMap<PlayerId, Box<dyn PlayerPolicy + Send>>,
    rejected: usize,
}

impl SimulationSession {
    /// # Errors
    ///
    /// Returns `SimulationError::Setup` when the lobby is rejected.
    pub fn new(
        config: SimulationConfig,
        catalog: Arc<Catalog>,
        game_config: Arc<GameConfig>,
    ) -> Result<Self, SimulationError> {
        let lobby = config.lobby();
        let session = GameSession::new(
            Arc::clone(&catalog),
            Arc::clone(&game_config),
            &lobby,
            config.seed,
        )?;
        let policies = lobby
            .iter()
            .enumerate()
            .map(|(seat, entry)| {
                let policy_seed = config.seed.wrapping_add(seat as u64 + 1);
                (entry.id.clone(), config.strategy.create_policy(policy_seed))
            })
            .collect();
        Ok(Self {
            config,
            catalog,
            game_config,
            session,
            policies,
            rejected: 0,
        })
    }

    /// Answer one pending decision. Returns `false` once the game has finished.
    ///
    /// # Errors
    ///
    /// Fails when nobody can answer or the passive fallback is rejected.
    pub fn step(&mut self) -> Result<bool, SimulationError> {
        let state = self.session.state();
        if state.is_finished() {
            return Ok(false);
        }
        let Some(block) = state.block.as_ref() else {
            return Err(SimulationError::Stalled { block: "none" });
        };
        let tag = block.kind.tag();
        let Some(player) = block.waiting_for.first().cloned() else {
            return Err(SimulationError::Stalled { block: tag });
        };

        let proposed = self.policies.get_mut(&player).and_then(|policy| {
            policy
                .respond(state, &player)
                .map(|command| (policy.name(), command))
        });
        if let Some((policy, command)) = proposed {
            let name = command.name();
            match self.session.submit(command) {
                Ok(_) => return Ok(true),
                Err(err) => {
                    self.rejected += 1;
                    log::debug!("{player} ({policy}) {name} rejected on {tag}: {err}");
                }
            }
        }

        let fallback = passive_command(self.session.state(), &player)
            .ok_or(SimulationError::Stalled { block: tag })?;
        self.submit_fallback(&player, fallback)?;
        Ok(true)
    }

    fn submit_fallback(&mut self, player: &PlayerId, command: Command) -> Result<(), SimulationError> {
        self.session
            .submit(command)
            .map(|_| ())
            .map_err(|source| SimulationError::Rejected {
                player: player.clone(),
                source,
            })
    }

    /// Play until the game finishes.
    ///
    /// # Errors
    ///
    /// Propagates step failures and `CommandBudget` when the game runs long.
    pub fn run(mut self) -> Result<SimulationSummary, SimulationError> {
        while self.step()? {
            if self.session.history().len() >= self.config.max_commands {
                return Err(SimulationError::CommandBudget(self.config.max_commands));
            }
        }
        self.verify_replay()?;
        Ok(self.summary())
    }

    /// Rebuild the game from its seed and history and compare digests.
    ///
    /// # Errors
    ///
    /// Returns `Replay` for a rejected command or `DigestMismatch`.
    pub fn verify_replay(&self) -> Result<(), SimulationError> {
        let replayed = GameSession::replay(
            Arc::clone(&self.catalog),
            Arc::clone(&self.game_config),
            &self.config.lobby(),
            self.config.seed,
            self.session.history(),
        )?;
        let live = self.session.digest();
        if replayed.digest() == live {
            Ok(())
        } else {
            Err(SimulationError::DigestMismatch {
                live,
                replayed: replayed.digest(),
            })
        }
    }

    #[must_use]
    pub fn summary(&self) -> SimulationSummary {
        let state = self.session.state();
        let scores = state
            .players
            .iter()
            .map(|p| (p.id.clone(), p.vp.total))
            .collect();
        SimulationSummary {
            commands: self.session.history().len(),
            rejected: self.rejected,
            rounds: state.round,
            finished: state.is_finished(),
            winner: state.winner.clone(),
            scores,
            events: state.log.total(),
            digest: self.session.digest(),
        }
    }
}
