use std::fmt::{Debug, Display};
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::net::ProtocolError;

const CODE_ALPHABET: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Short code players use to find a lobby, four uppercase ASCII letters.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct LobbyCode([u8; LobbyCode::LEN]);

impl LobbyCode {
    pub const LEN: usize = 4;

    pub fn random(rng: &mut impl Rng) -> Self {
        let mut code = [0; Self::LEN];
        for c in &mut code {
            *c = CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())];
        }
        Self(code)
    }
}

impl FromStr for LobbyCode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; Self::LEN] = s
            .as_bytes()
            .try_into()
            .map_err(|_| ProtocolError::InvalidLobbyCode(s.to_owned()))?;
        if !bytes.iter().all(u8::is_ascii_uppercase) {
            return Err(ProtocolError::InvalidLobbyCode(s.to_owned()));
        }
        Ok(Self(bytes))
    }
}

impl Display for LobbyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.iter().try_for_each(|&c| write!(f, "{}", c as char))
    }
}

impl Debug for LobbyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as Display>::fmt(self, f)
    }
}

impl Serialize for LobbyCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Settings chosen by the player who creates a lobby. Both are echoed back to every
/// member when the game starts, whatever JSON the client sent for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyOptions {
    pub map: Value,
    pub difficulty: Difficulty,
}

/// Difficulty tier picked by the lobby host.
///
/// The value the client sent is kept so it can be echoed back verbatim. Anything
/// unrecognized, including values that aren't strings, behaves like
/// [`Difficulty::Normal`] when spawning enemies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Difficulty {
    Normal,
    Hard,
    Impossible,
    Other(Value),
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::Other(Value::Null)
    }
}

impl Difficulty {
    /// Number of enemies spawned per batch, at game start and after each coin pickup.
    pub fn enemy_batch_size(&self) -> usize {
        match self {
            Difficulty::Normal => 1,
            Difficulty::Hard => 2,
            Difficulty::Impossible => 5,
            Difficulty::Other(_) => 1,
        }
    }
}

impl From<Value> for Difficulty {
    fn from(v: Value) -> Self {
        match v.as_str() {
            Some("normal") => Self::Normal,
            Some("hard") => Self::Hard,
            Some("impossible") => Self::Impossible,
            _ => Self::Other(v),
        }
    }
}

impl From<Difficulty> for Value {
    fn from(d: Difficulty) -> Self {
        match d {
            Difficulty::Normal => "normal".into(),
            Difficulty::Hard => "hard".into(),
            Difficulty::Impossible => "impossible".into(),
            Difficulty::Other(v) => v,
        }
    }
}
