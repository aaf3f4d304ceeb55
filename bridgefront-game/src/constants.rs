//! Centralized rule constants for the Bridgefront engine.
//!
//! Values that tables in `GameConfig` do not cover live here so that the
//! base combat and board math can only change through reviewed code.

// Lobby --------------------------------------------------------------------
pub(crate) const MIN_PLAYERS: usize = 2;
pub(crate) const MAX_PLAYERS: usize = 6;
pub(crate) const HOST_SEAT: usize = 0;

// Board --------------------------------------------------------------------
pub(crate) const MAX_PLAYERS_PER_HEX: usize = 2;
pub(crate) const MIN_MINE_VALUE: u32 = 1;
pub(crate) const MAX_MINE_VALUE: u32 = 3;
pub(crate) const CAPITAL_REINFORCE_FORCES: u32 = 1;

// Combat -------------------------------------------------------------------
pub(crate) const DIE_SIDES: u32 = 6;
pub(crate) const FORCE_HIT_FACES: u32 = 2;
pub(crate) const FORCE_ATTACK_DICE: u32 = 1;
pub(crate) const STALE_ROUND_CAP: u32 = 20;
pub(crate) const MAX_ATTACK_DICE: u32 = 12;

// Scoring ------------------------------------------------------------------
pub(crate) const CENTER_CONTROL_VP: u32 = 1;
pub(crate) const FORGE_CONTROL_VP: u32 = 1;
pub(crate) const CAPITAL_CONTROL_VP: u32 = 1;

// RNG domain tags ----------------------------------------------------------
pub(crate) const RNG_DOMAIN_GAME: &[u8] = b"bridgefront.game";

// Digest -------------------------------------------------------------------
pub(crate) const DIGEST_SEED: u64 = 0x6272_6964_6765_6672;
