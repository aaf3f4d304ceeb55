//! A game plus the commands that produced it.

use std::sync::Arc;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::command::{apply_command, Command, CommandError};
use crate::config::GameConfig;
use crate::ids::PlayerId;
use crate::round::setup::{new_game, LobbySeat, SetupError};
use crate::state::GameState;
use crate::view::{build_view, GameView};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("replay setup failed: {0}")]
    Setup(#[from] SetupError),
    #[error("replay command {index} was rejected: {source}")]
    Rejected {
        index: usize,
        #[source]
        source: CommandError,
    },
}

#[derive(Debug, Clone)]
pub struct GameSession {
    state: GameState,
    history: Vec<Command>,
}

impl GameSession {
    /// Start a session on a freshly created game.
    ///
    /// # Errors
    ///
    /// Propagates `SetupError` from game creation.
    pub fn new(
        catalog: Arc<Catalog>,
        config: Arc<GameConfig>,
        lobby: &[LobbySeat],
        seed: u64,
    ) -> Result<Self, SetupError> {
        Ok(Self::from_state(new_game(catalog, config, lobby, seed)?))
    }

    /// Wrap an existing state with an empty history.
    #[must_use]
    pub const fn from_state(state: GameState) -> Self {
        Self {
            state,
            history: Vec::new(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> &GameState {
        &self.state
    }

    #[must_use]
    pub fn history(&self) -> &[Command] {
        &self.history
    }

    /// Apply a command; on rejection the session is unchanged.
    ///
    /// # Errors
    ///
    /// Returns the `CommandError` that rejected the command.
    pub fn submit(&mut self, command: Command) -> Result<&GameState, CommandError> {
        let next = apply_command(&self.state, &command)?;
        self.state = next;
        self.history.push(command);
        Ok(&self.state)
    }

    #[must_use]
    pub fn view(&self, viewer: &PlayerId) -> GameView {
        build_view(&self.state, viewer)
    }

    #[must_use]
    pub fn digest(&self) -> u64 {
        self.state.digest()
    }

    #[must_use]
    pub fn into_state(self) -> GameState {
        self.state
    }

    /// Rebuild a session from its seed and command list; every command must
    /// be accepted again.
    ///
    /// # Errors
    ///
    /// Returns `ReplayError` for a setup failure or the first rejected command.
    pub fn replay(
        catalog: Arc<Catalog>,
        config: Arc<GameConfig>,
        lobby: &[LobbySeat],
        seed: u64,
        commands: &[Command],
    ) -> Result<Self, ReplayError> {
        let mut session = Self::new(catalog, config, lobby, seed)?;
        for (index, command) in commands.iter().enumerate() {
            session
                .submit(command.clone())
                .map_err(|source| ReplayError::Rejected { index, source })?;
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lobby() -> Vec<LobbySeat> {
        vec![LobbySeat::new("ana", "goldhand"), LobbySeat::new("bo", "warhost")]
    }

    #[test]
    fn rejected_submissions_do_not_enter_history() {
        let mut session = GameSession::new(
            Arc::new(Catalog::load_from_static()),
            Arc::new(GameConfig::default()),
            &lobby(),
            5,
        )
        .unwrap();
        let digest = session.digest();
        assert!(session
            .submit(Command::AdvanceSetup {
                player: PlayerId::new("bo")
            })
            .is_err());
        assert_eq!(session.digest(), digest);
        assert!(session.history().is_empty());

        session
            .submit(Command::AdvanceSetup {
                player: PlayerId::new("ana"),
            })
            .unwrap();
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn replay_reproduces_the_digest_and_reports_rejections() {
        let catalog = Arc::new(Catalog::load_from_static());
        let config = Arc::new(GameConfig::default());
        let commands = vec![Command::AdvanceSetup {
            player: PlayerId::new("ana"),
        }];
        let first = GameSession::replay(Arc::clone(&catalog), Arc::clone(&config), &lobby(), 8, &commands).unwrap();
        let second = GameSession::replay(Arc::clone(&catalog), Arc::clone(&config), &lobby(), 8, &commands).unwrap();
        assert_eq!(first.digest(), second.digest());

        let doubled = vec![commands[0].clone(), commands[0].clone()];
        let err = GameSession::replay(catalog, config, &lobby(), 8, &doubled).unwrap_err();
        assert!(matches!(err, ReplayError::Rejected { index: 1, .. }));
    }
}
