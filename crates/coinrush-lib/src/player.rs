use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::PlayerId;

/// Authoritative per-player record that is relayed to every member of a lobby.
///
/// Clients are free to attach fields of their own (a name, a facing direction, ...).
/// Those are kept in `extra` and relayed untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerState {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub speed: f64,
    pub score: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            x: 100.,
            y: 100.,
            width: 40.,
            height: 40.,
            speed: 4.,
            score: 0.,
            extra: Map::new(),
        }
    }
}

impl PlayerState {
    /// Shallow merge: fields present in `update` overwrite ours, everything else is kept.
    pub fn merge(&mut self, update: PlayerStateUpdate) {
        let PlayerStateUpdate {
            x,
            y,
            width,
            height,
            speed,
            score,
            extra,
        } = update;

        for (field, value) in [
            (&mut self.x, x),
            (&mut self.y, y),
            (&mut self.width, width),
            (&mut self.height, height),
            (&mut self.speed, speed),
            (&mut self.score, score),
        ] {
            if let Some(value) = value {
                *field = value;
            }
        }
        self.extra.extend(extra);
    }
}

/// Partial [`PlayerState`] as sent by a client in a `player_state` message.
///
/// A known field that isn't a number is dropped on its own, the rest of the update
/// still applies.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlayerStateUpdate {
    #[serde(default, deserialize_with = "number")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "number")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "number")]
    pub width: Option<f64>,
    #[serde(default, deserialize_with = "number")]
    pub height: Option<f64>,
    #[serde(default, deserialize_with = "number")]
    pub speed: Option<f64>,
    #[serde(default, deserialize_with = "number")]
    pub score: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(Value::deserialize(deserializer)?.as_f64())
}

/// Player states of a lobby, kept in join order.
///
/// Join order matters: nearest-player searches resolve ties in favor of whoever
/// joined first. Serializes as a map from player id to state.
#[derive(Debug, Clone, Default)]
pub struct Players(Vec<(PlayerId, PlayerState)>);

impl Players {
    /// Insert a state for `id`, replacing any existing one without changing join order.
    pub fn insert(&mut self, id: PlayerId, state: PlayerState) {
        match self.get_mut(id) {
            Some(existing) => *existing = state,
            None => self.0.push((id, state)),
        }
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<PlayerState> {
        let idx = self.0.iter().position(|(p, _)| *p == id)?;
        Some(self.0.remove(idx).1)
    }

    pub fn get(&self, id: PlayerId) -> Option<&PlayerState> {
        self.0.iter().find(|(p, _)| *p == id).map(|(_, s)| s)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut PlayerState> {
        self.0.iter_mut().find(|(p, _)| *p == id).map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &PlayerState)> {
        self.0.iter().map(|(id, s)| (*id, s))
    }

    pub fn states(&self) -> impl Iterator<Item = &PlayerState> {
        self.0.iter().map(|(_, s)| s)
    }
}

impl Serialize for Players {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(id, s)| (id, s)))
    }
}
