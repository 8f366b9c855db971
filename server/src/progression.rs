//! XP curve, kill rewards and skill point spending.

use shared::protocol::SyncedProgress;
use shared::stats::MAX_STAT_POINTS;
use shared::{
    HitZone, Stat, SKILL_POINTS_PER_LEVEL, XP_HEADSHOT_BONUS, XP_PER_KILL, XP_PER_STREAK_LEVEL,
};
use thiserror::Error;

use crate::entity::Player;

/// Level reached at a given cumulative XP: `floor(sqrt(xp / 100)) + 1`.
pub fn level_for_xp(xp: u32) -> u32 {
    let hundreds = xp / 100;
    let mut root = (hundreds as f64).sqrt() as u32;
    // Float sqrt can land one off for large inputs.
    while root * root > hundreds {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= hundreds {
        root += 1;
    }
    root + 1
}

/// XP for a kill at the killer's (already incremented) streak.
pub fn kill_xp(kill_streak: u32, zone: HitZone) -> u32 {
    let streak_bonus = kill_streak.saturating_sub(1).saturating_mul(XP_PER_STREAK_LEVEL);
    let mut xp = XP_PER_KILL.saturating_add(streak_bonus);
    if zone == HitZone::Head {
        xp = xp.saturating_add(XP_HEADSHOT_BONUS);
    }
    xp
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillReward {
    pub xp_gain: u32,
    pub kill_streak: u32,
    pub level: u32,
    pub levels_gained: u32,
    /// Skill points granted by this kill.
    pub new_points: u32,
}

/// Credits a kill to `killer`: counters, streak, XP, level and skill points.
pub fn credit_kill(killer: &mut Player, zone: HitZone) -> KillReward {
    killer.kills = killer.kills.saturating_add(1);
    killer.kill_streak = killer.kill_streak.saturating_add(1);
    killer.best_streak = killer.best_streak.max(killer.kill_streak);

    let xp_gain = kill_xp(killer.kill_streak, zone);
    killer.xp = killer.xp.saturating_add(xp_gain);

    let old_level = killer.level;
    let level = level_for_xp(killer.xp).max(old_level);
    let levels_gained = level - old_level;
    let new_points = levels_gained * SKILL_POINTS_PER_LEVEL;
    killer.level = level;
    killer.skill_points = killer.skill_points.saturating_add(new_points);

    KillReward {
        xp_gain,
        kill_streak: killer.kill_streak,
        level,
        levels_gained,
        new_points,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("unknown stat '{0}'")]
    UnknownStat(String),
    #[error("no skill points to spend")]
    NoSkillPoints,
    #[error("{0} is already at its maximum")]
    StatMaxed(Stat),
}

/// Most unspent points a saved profile can carry in.
pub const MAX_SYNCED_SKILL_POINTS: u32 = MAX_STAT_POINTS * Stat::ALL.len() as u32;

/// Spends one skill point on the named stat and re-derives the caps that
/// depend on it. A health point heals by the same amount; current ammo
/// scales with the new capacity. Returns the stat and its new value.
pub fn allocate_stat(player: &mut Player, name: &str) -> Result<(Stat, u32), AllocationError> {
    let stat: Stat = name
        .parse()
        .map_err(|_| AllocationError::UnknownStat(name.to_string()))?;
    if player.skill_points == 0 {
        return Err(AllocationError::NoSkillPoints);
    }
    if player.stats.is_maxed(stat) {
        return Err(AllocationError::StatMaxed(stat));
    }

    player.skill_points -= 1;
    let new_value = player.stats.increment(stat);

    match stat {
        Stat::Health => {
            let old_max = player.max_health;
            player.max_health = player.stats.max_health();
            player.health += player.max_health - old_max;
        }
        Stat::Ammo => {
            let old_max = player.weapon.max_ammo.max(1);
            player.weapon.max_ammo = player.stats.max_ammo();
            let ammo = u64::from(player.weapon.ammo);
            let new_max = u64::from(player.weapon.max_ammo);
            player.weapon.ammo = (ammo * new_max / u64::from(old_max)).min(new_max) as u32;
        }
        Stat::Speed | Stat::Jump | Stat::Dash | Stat::Aim => {}
    }

    Ok((stat, new_value))
}

/// Overwrites progression from an external save. Fields absent from the save
/// are left alone. Stats and unspent points are capped, the level never
/// exceeds what any XP total can reach, and health and ammo are clamped to
/// the re-derived caps.
pub fn sync_progress(player: &mut Player, progress: &SyncedProgress) {
    if let Some(name) = progress.name.as_ref().filter(|name| !name.is_empty()) {
        player.name = name.clone();
    }
    if let Some(kills) = progress.kills {
        player.kills = kills;
    }
    if let Some(deaths) = progress.deaths {
        player.deaths = deaths;
    }
    if let Some(level) = progress.level {
        player.level = level.clamp(1, level_for_xp(u32::MAX));
    }
    if let Some(xp) = progress.xp {
        player.xp = xp;
    }
    if let Some(skill_points) = progress.skill_points {
        player.skill_points = skill_points.min(MAX_SYNCED_SKILL_POINTS);
    }
    if let Some(stats) = progress.skills {
        player.stats = stats.clamped();
    }

    player.max_health = player.stats.max_health();
    player.health = player.health.min(player.max_health);
    player.weapon.max_ammo = player.stats.max_ammo();
    player.weapon.ammo = player.weapon.ammo.min(player.weapon.max_ammo);
}
