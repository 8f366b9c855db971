//! Stat investments and the multipliers they feed into movement, combat and
//! survivability.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::{BASE_MAX_AMMO, BASE_MAX_HEALTH};

pub const SPEED_PER_POINT: f32 = 0.05;
pub const HEALTH_PER_POINT: f32 = 10.0;
pub const AMMO_PER_POINT: u32 = 2;
pub const JUMP_PER_POINT: f32 = 0.10;
pub const DASH_PER_POINT: f32 = 0.025;
pub const AIM_PER_POINT: f32 = 0.10;
pub const MAX_AIM_REDUCTION: f32 = 0.8;
/// Ceiling for a single stat, however the points got there.
pub const MAX_STAT_POINTS: u32 = 100;

/// One of the six stats a player can raise with skill points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    Speed,
    Health,
    Ammo,
    Jump,
    Dash,
    Aim,
}

impl Stat {
    pub const ALL: [Stat; 6] = [
        Stat::Speed,
        Stat::Health,
        Stat::Ammo,
        Stat::Jump,
        Stat::Dash,
        Stat::Aim,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stat::Speed => "speed",
            Stat::Health => "health",
            Stat::Ammo => "ammo",
            Stat::Jump => "jump",
            Stat::Dash => "dash",
            Stat::Aim => "aim",
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown stat '{0}'")]
pub struct UnknownStat(pub String);

impl FromStr for Stat {
    type Err = UnknownStat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stat::ALL
            .iter()
            .copied()
            .find(|stat| stat.as_str() == s)
            .ok_or_else(|| UnknownStat(s.to_string()))
    }
}

/// Raw stat investments. Every derived value is linear in its stat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub speed: u32,
    #[serde(default)]
    pub health: u32,
    #[serde(default)]
    pub ammo: u32,
    #[serde(default)]
    pub jump: u32,
    #[serde(default)]
    pub dash: u32,
    #[serde(default)]
    pub aim: u32,
}

impl Stats {
    pub fn get(&self, stat: Stat) -> u32 {
        match stat {
            Stat::Speed => self.speed,
            Stat::Health => self.health,
            Stat::Ammo => self.ammo,
            Stat::Jump => self.jump,
            Stat::Dash => self.dash,
            Stat::Aim => self.aim,
        }
    }

    /// Increments a stat and returns its new value. Stops at
    /// [`MAX_STAT_POINTS`].
    pub fn increment(&mut self, stat: Stat) -> u32 {
        let slot = match stat {
            Stat::Speed => &mut self.speed,
            Stat::Health => &mut self.health,
            Stat::Ammo => &mut self.ammo,
            Stat::Jump => &mut self.jump,
            Stat::Dash => &mut self.dash,
            Stat::Aim => &mut self.aim,
        };
        *slot = slot.saturating_add(1).min(MAX_STAT_POINTS);
        *slot
    }

    /// Every stat limited to [`MAX_STAT_POINTS`].
    pub fn clamped(self) -> Self {
        Stats {
            speed: self.speed.min(MAX_STAT_POINTS),
            health: self.health.min(MAX_STAT_POINTS),
            ammo: self.ammo.min(MAX_STAT_POINTS),
            jump: self.jump.min(MAX_STAT_POINTS),
            dash: self.dash.min(MAX_STAT_POINTS),
            aim: self.aim.min(MAX_STAT_POINTS),
        }
    }

    pub fn is_maxed(&self, stat: Stat) -> bool {
        self.get(stat) >= MAX_STAT_POINTS
    }

    /// Applies to both movement and projectile speed.
    pub fn speed_multiplier(&self) -> f32 {
        1.0 + self.speed as f32 * SPEED_PER_POINT
    }

    pub fn max_health(&self) -> f32 {
        BASE_MAX_HEALTH + self.health as f32 * HEALTH_PER_POINT
    }

    pub fn max_ammo(&self) -> u32 {
        BASE_MAX_AMMO.saturating_add(self.ammo.saturating_mul(AMMO_PER_POINT))
    }

    pub fn jump_multiplier(&self) -> f32 {
        1.0 + self.jump as f32 * JUMP_PER_POINT
    }

    pub fn dash_multiplier(&self) -> f32 {
        1.0 + self.dash as f32 * DASH_PER_POINT
    }

    /// Fraction of the base spread that remains, never below 20%.
    pub fn spread_multiplier(&self) -> f32 {
        1.0 - (self.aim as f32 * AIM_PER_POINT).min(MAX_AIM_REDUCTION)
    }
}
