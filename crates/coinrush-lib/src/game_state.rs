use std::time::{Duration, Instant};

use rand::Rng;
use serde::Serialize;

use crate::lobby::Difficulty;
use crate::player::Players;

/// Playing field that coins and enemies spawn in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arena {
    pub width: f64,
    pub height: f64,
    /// Coins never spawn closer than this to an edge.
    pub inset: f64,
}

impl Default for Arena {
    fn default() -> Self {
        Self {
            width: 800.,
            height: 600.,
            inset: 30.,
        }
    }
}

impl Arena {
    pub fn spawn_coin(&self, rng: &mut impl Rng) -> Coin {
        Coin {
            x: rng.gen::<f64>() * (self.width - 2. * self.inset) + self.inset,
            y: rng.gen::<f64>() * (self.height - 2. * self.inset) + self.inset,
        }
    }

    pub fn spawn_enemy(&self, rng: &mut impl Rng) -> Enemy {
        Enemy::new(
            rng.gen::<f64>() * self.width,
            rng.gen::<f64>() * self.height,
            1. + rng.gen::<f64>(),
        )
    }
}

/// Fixed parameters of the world simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub arena: Arena,
    /// Simulation steps per second.
    pub tick_rate: u32,
    /// Enemy speed is expressed in units per reference frame.
    pub reference_frame: Duration,
    pub retarget_cooldown: Duration,
    /// A player closer than this to a coin's center collects it.
    pub pickup_radius: f64,
    /// Coins seeded at lobby creation and respawned after each pickup.
    pub coins_per_spawn: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            arena: Arena::default(),
            tick_rate: 60,
            reference_frame: Duration::from_micros(16_670),
            retarget_cooldown: Duration::from_millis(500),
            pickup_radius: 30.,
            coins_per_spawn: 2,
        }
    }
}

impl SimConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coin {
    pub x: f64,
    pub y: f64,
}

/// Direction and distance to the player an enemy was chasing when it last retargeted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub dx: f64,
    pub dy: f64,
    pub dist: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enemy {
    pub x: f64,
    pub y: f64,
    pub speed: f64,
    #[serde(skip)]
    pub last_update: Option<Instant>,
    #[serde(skip)]
    pub target: Option<Target>,
    #[serde(skip)]
    pub retarget_at: Option<Instant>,
}

impl Enemy {
    pub fn new(x: f64, y: f64, speed: f64) -> Self {
        Self {
            x,
            y,
            speed,
            last_update: None,
            target: None,
            retarget_at: None,
        }
    }

    /// Advance this enemy to `now`.
    ///
    /// The enemy keeps heading along the vector it cached at its last retarget, even if
    /// that player has since moved. A new target is only picked once the cooldown expires.
    pub fn step(&mut self, players: &Players, now: Instant, config: &SimConfig) {
        let last_update = *self.last_update.get_or_insert(now);
        let frames = now.saturating_duration_since(last_update).as_secs_f64()
            / config.reference_frame.as_secs_f64();
        self.last_update = Some(now);

        if self.retarget_at.map_or(true, |at| now > at) {
            if let Some(target) = self.nearest_player(players) {
                self.target = Some(target);
                self.retarget_at = Some(now + config.retarget_cooldown);
            }
        }

        match self.target {
            Some(Target { dx, dy, dist }) if dist > 0. => {
                self.x += dx / dist * self.speed * frames;
                self.y += dy / dist * self.speed * frames;
            }
            _ => (),
        }
    }

    /// Ties go to whoever joined the lobby first.
    fn nearest_player(&self, players: &Players) -> Option<Target> {
        let mut nearest: Option<Target> = None;
        for p in players.states() {
            let dx = p.x - self.x;
            let dy = p.y - self.y;
            let dist = dx.hypot(dy);
            if nearest.map_or(true, |n| dist < n.dist) {
                nearest = Some(Target { dx, dy, dist });
            }
        }
        nearest
    }
}

/// Everything that is simulated for a lobby and sent out in each snapshot.
#[derive(Debug, Clone, Default)]
pub struct GameState {
    pub players: Players,
    pub coins: Vec<Coin>,
    pub enemies: Vec<Enemy>,
}

impl GameState {
    /// A fresh world with the initial set of coins and no enemies.
    pub fn new(config: &SimConfig, rng: &mut impl Rng) -> Self {
        let mut state = Self::default();
        state.spawn_coins(config, rng);
        state
    }

    pub fn spawn_coins(&mut self, config: &SimConfig, rng: &mut impl Rng) {
        self.coins
            .extend((0..config.coins_per_spawn).map(|_| config.arena.spawn_coin(rng)));
    }

    pub fn spawn_enemies(&mut self, difficulty: &Difficulty, arena: &Arena, rng: &mut impl Rng) {
        self.enemies
            .extend((0..difficulty.enemy_batch_size()).map(|_| arena.spawn_enemy(rng)));
    }

    /// Remove every coin that any player is touching.
    ///
    /// Coins are checked from last to first. If at least one was collected, a fixed
    /// number of new coins and one batch of enemies are spawned, however many coins
    /// went in this pass. Returns whether anything was collected.
    pub fn collect_coins(
        &mut self,
        difficulty: &Difficulty,
        config: &SimConfig,
        rng: &mut impl Rng,
    ) -> bool {
        let mut collected = false;
        for i in (0..self.coins.len()).rev() {
            let coin = self.coins[i];
            if self
                .players
                .states()
                .any(|p| (p.x - coin.x).hypot(p.y - coin.y) < config.pickup_radius)
            {
                self.coins.remove(i);
                collected = true;
            }
        }

        if collected {
            self.spawn_coins(config, rng);
            self.spawn_enemies(difficulty, &config.arena, rng);
        }
        collected
    }

    pub fn step_enemies(&mut self, now: Instant, config: &SimConfig) {
        for enemy in &mut self.enemies {
            enemy.step(&self.players, now, config);
        }
    }
}
