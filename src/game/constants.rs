//! Tuned balance constants.
//!
//! Most values here are game-design artifacts carried over from play
//! testing. Treat them as configuration to preserve: the curves (armor,
//! time-based HP growth, spawn ramp) are balanced against each other.

/// Simulation timing constants
pub mod sim {
    /// Logical tick rate in Hz (the driver passes an explicit dt, this is
    /// the rate it is expected to run at)
    pub const TICK_RATE: u32 = 60;
    /// Delta time per tick in seconds
    pub const DT: f32 = 1.0 / 60.0;
}

/// Arena constants
pub mod arena {
    /// Playfield radius in world units (circular arena)
    pub const RADIUS: f32 = 1600.0;
    /// Ring just inside the boundary where enemies are spawned
    pub const SPAWN_MARGIN: f32 = 60.0;
    /// Minimum distance from the player for any spawn placement
    pub const SPAWN_MIN_PLAYER_DIST: f32 = 320.0;
    /// Attempts to find a clear spawn position before falling back
    pub const MAX_SPAWN_ATTEMPTS: u32 = 20;
}

/// Player baseline stats (pre-bonus, resolved through the stat formula)
pub mod player {
    /// Base maximum HP
    pub const BASE_HP: f32 = 100.0;
    /// Base projectile damage
    pub const BASE_DAMAGE: f32 = 12.0;
    /// Base attacks per second
    pub const BASE_ATTACK_RATE: f32 = 1.4;
    /// Base armor value
    pub const BASE_ARMOR: f32 = 0.0;
    /// Base HP regenerated per second
    pub const BASE_REGEN: f32 = 0.6;
    /// Move speed in units per second
    pub const MOVE_SPEED: f32 = 260.0;
    /// Player collision radius
    pub const RADIUS: f32 = 16.0;
    /// Knockback velocity decay per second (exponential)
    pub const KNOCKBACK_DECAY: f32 = 6.0;
    /// Invincibility window after a guard triggers (seconds)
    pub const GUARD_INVINCIBILITY: f32 = 2.0;
    /// Minimum relocation distance when a guard fires
    pub const GUARD_MIN_RELOCATE_DIST: f32 = 400.0;
    /// Lifesteal fraction of damage dealt
    pub const LIFESTEAL_RATIO: f32 = 0.05;
    /// Lifesteal overflow converts to shield up to this fraction of max HP
    pub const OVERFLOW_SHIELD_CAP_RATIO: f32 = 0.5;
    /// Lifetime of an overflow shield chunk (seconds)
    pub const OVERFLOW_SHIELD_DURATION: f32 = 8.0;
}

/// Armor reduction curve.
///
/// reduction(a) = cap * ln(1 + a/SCALE) / (CURVE + ln(1 + a/SCALE))
///
/// Zero armor gives zero reduction, the curve is monotonic, and it
/// approaches (never reaches) the cap.
pub mod armor {
    /// Armor units per e-fold of the logarithm
    pub const SCALE: f32 = 10.0;
    /// Curve softness (higher = slower approach to the cap)
    pub const CURVE: f32 = 2.0;
    /// Default reduction cap
    pub const CAP: f32 = 0.95;
    /// Cap with the reinforced-plating upgrade
    pub const UPGRADED_CAP: f32 = 0.97;
    /// Upgrade id consulted through the progression hooks
    pub const PLATING_UPGRADE: &str = "reinforced_plating";
}

/// Combat resolution constants
pub mod combat {
    /// Extra reach added to enemy size for contact damage
    pub const CONTACT_PAD: f32 = 10.0;
    /// Per-enemy cooldown between contact damage instances (seconds)
    pub const CONTACT_COOLDOWN: f32 = 0.5;
    /// Contact damage = COEFF * max_hp^POWER for enemies without a custom rule
    pub const CONTACT_COEFF: f32 = 1.8;
    pub const CONTACT_POWER: f32 = 0.35;
    /// Custom contact rule: fraction of player max HP
    pub const CONTACT_PLAYER_MAX_HP_RATIO: f32 = 0.15;
    /// Projectile hit radius against enemy centers
    pub const HIT_RADIUS: f32 = 14.0;
    /// Damage multiplier inside a mark window
    pub const MARK_CRIT_MULT: f32 = 1.5;
    /// Execute: targets at or below this HP fraction may be killed outright
    pub const EXECUTE_HP_THRESHOLD: f32 = 0.15;
    /// Upgrade id granting execute chance (level * EXECUTE_CHANCE_PER_LEVEL)
    pub const EXECUTE_UPGRADE: &str = "reaper_rounds";
    pub const EXECUTE_CHANCE_PER_LEVEL: f32 = 0.05;
    /// Thorns reflect this fraction of damage dealt back at the attacker
    pub const THORNS_RATIO: f32 = 0.25;
}

/// Player projectile constants
pub mod projectile {
    /// Projectile lifetime in seconds
    pub const LIFETIME: f32 = 3.0;
    /// Projectile speed in units per second
    pub const SPEED: f32 = 520.0;
    /// Homing turn rate in radians per second
    pub const HOMING_TURN_RATE: f32 = 4.0;
    /// Bounce count for bouncing shots
    pub const BOUNCE_COUNT: u8 = 2;
}

/// Ring weapon (orbiter fusion) constants.
///
/// Hysteresis: FUSE_THRESHOLD must stay above UNFUSE_AMMO or the ring
/// oscillates between fused and unfused every few hits.
pub mod ring {
    /// Orbiter count at which individual orbiters fuse into a pooled ring
    pub const FUSE_THRESHOLD: usize = 8;
    /// Ammo level below which a ring decomposes back into orbiters
    pub const UNFUSE_AMMO: f32 = 3.0;
    /// Orbit radius of individual orbiters and the fused ring
    pub const ORBIT_RADIUS: f32 = 90.0;
    /// Angular speed of orbiters (radians per second)
    pub const ORBIT_SPEED: f32 = 2.6;
    /// Annulus half-thickness for ring collision
    pub const RING_HIT_PAD: f32 = 16.0;
    /// Ammo cost per enemy struck by the fused ring
    pub const AMMO_PER_HIT: f32 = 0.5;
    /// Seconds between ring damage pulses
    pub const PULSE_INTERVAL: f32 = 0.5;
    /// Orbiters maintained per upgrade level
    pub const ORBITERS_PER_LEVEL: usize = 4;
    /// Hard cap on live orbiters
    pub const ORBITER_CAP: usize = 12;
}

/// Enemy baseline constants
pub mod enemy {
    /// Base max HP at minute zero
    pub const BASE_HP: f32 = 20.0;
    /// Linear HP growth per minute of game time
    pub const HP_MINUTE_SCALE: f32 = 0.35;
    /// Power applied to the time-scaled HP term
    pub const HP_TIME_EXPONENT: f32 = 1.15;
    /// Random micro-jitter magnitude added to steering output
    pub const JITTER: f32 = 6.0;
    /// Radius of the local separation query
    pub const SEPARATION_RADIUS: f32 = 28.0;
    /// Separation push strength
    pub const SEPARATION_PUSH: f32 = 40.0;
    /// Elite stat multipliers
    pub const ELITE_HP_MULT: f32 = 4.0;
    pub const ELITE_SIZE_MULT: f32 = 1.5;
    pub const ELITE_SPEED_MULT: f32 = 0.9;
    /// Fraction of freshly spawned elites that carry thorns
    pub const ELITE_THORNS_CHANCE: f64 = 0.3;
    /// Rare (snitch) tuning: fast, flees, despawns if not caught
    pub const SNITCH_SPEED_MULT: f32 = 1.6;
    pub const SNITCH_LIFETIME: f32 = 12.0;
    /// Fraction of spawns that come in flanking pairs
    pub const FLANK_CHANCE: f64 = 0.2;
    /// Flanker approach offset distance
    pub const FLANK_DISTANCE: f32 = 220.0;
    /// Contagion spread radius on infected death
    pub const CONTAGION_RADIUS: f32 = 120.0;
    /// Contagion cloud lifetime and pulse damage
    pub const CONTAGION_DURATION: f32 = 4.0;
    pub const CONTAGION_PULSE_INTERVAL: f32 = 0.8;
}

/// Merge clustering constants
pub mod merge {
    /// Seconds between cluster scans
    pub const SCAN_INTERVAL: f32 = 2.0;
    /// Radius within which same-shape enemies cluster
    pub const RADIUS: f32 = 140.0;
    /// Time from cluster formation to elite promotion
    pub const TIMER: f32 = 6.0;
    /// Re-scan cooldown after a cluster disbands
    pub const DISBAND_COOLDOWN: f32 = 5.0;
    /// Promoted elite multipliers (stronger than a natural elite)
    pub const HP_MULT: f32 = 6.0;
    pub const SIZE_MULT: f32 = 1.8;
    pub const REWARD_MULT: f32 = 8.0;
}

/// Legion formation constants
pub mod legion {
    /// Formation grid dimensions
    pub const COLS: u8 = 4;
    pub const ROWS: u8 = 3;
    /// Distance between formation slots
    pub const SLOT_SPACING: f32 = 70.0;
    /// Pooled shield granted per member at spawn
    pub const SHIELD_PER_MEMBER: f32 = 35.0;
    /// Maximum per-tick member displacement toward its slot
    pub const MEMBER_MAX_STEP: f32 = 6.0;
    /// Reward multiplier for legion members
    pub const REWARD_MULT: f32 = 3.0;
}

/// Worm chain constants
pub mod worm {
    /// Position history samples kept by the head
    pub const HISTORY_CAP: usize = 240;
    /// History indices of lag per segment order
    pub const SEGMENT_LAG: usize = 6;
    /// Hard cap on segments per chain
    pub const MAX_SEGMENTS: u16 = 12;
    /// Seconds between underground segment growth
    pub const GROW_INTERVAL: f32 = 3.0;
    /// Phase durations (seconds)
    pub const SURFACE_DURATION: f32 = 8.0;
    pub const DIG_DURATION: f32 = 1.5;
    pub const UNDERGROUND_DURATION: f32 = 6.0;
    pub const ERUPT_DURATION: f32 = 1.0;
    /// Eruption knockback applies within this radius
    pub const ERUPT_RADIUS: f32 = 140.0;
    /// Knockback impulse applied to the player by an eruption
    pub const ERUPT_KNOCKBACK: f32 = 420.0;
    /// Fraction of max HP regenerated per second while underground
    pub const UNDERGROUND_REGEN: f32 = 0.02;
    /// Chance an interior kill splits off an independent second chain
    pub const SPLIT_CHANCE: f64 = 0.35;
    /// Underground wander speed multiplier
    pub const UNDERGROUND_SPEED_MULT: f32 = 1.4;
}

/// Boss phase machine constants
pub mod boss {
    /// Base phase cycle: chase -> lock-on -> dash -> cooldown
    pub const LOCKON_DURATION: f32 = 0.9;
    pub const DASH_DURATION: f32 = 0.6;
    pub const DASH_SPEED_MULT: f32 = 4.5;
    pub const COOLDOWN_DURATION: f32 = 2.5;
    /// Chase time before the next lock-on
    pub const CHASE_DURATION: f32 = 4.0;
    /// Boss HP multiplier over the time-scaled baseline
    pub const HP_MULT: f32 = 60.0;
    pub const SIZE_MULT: f32 = 3.2;
    /// Seconds of game time per boss tier when not assigned at spawn
    pub const TIER_TIME_STEP: f32 = 600.0;
    /// Flat soul reward per boss kill, scaled by tier
    pub const REWARD_PER_TIER: f32 = 50.0;

    // Tier-layered abilities
    /// Pull: suction toward the boss
    pub const PULL_RADIUS: f32 = 380.0;
    pub const PULL_STRENGTH: f32 = 120.0;
    /// Deflect: bubble that reflects player projectiles
    pub const DEFLECT_BUBBLE: f32 = 90.0;
    /// Deflect chance while dashing (rolled per projectile)
    pub const DEFLECT_DASH_CHANCE: f64 = 0.35;
    /// Shield: orbiting satellite count and radius
    pub const SATELLITE_COUNT: u8 = 4;
    pub const SATELLITE_ORBIT: f32 = 110.0;
    pub const SATELLITE_ORBIT_SPEED: f32 = 1.8;
    /// Beam: sweeping beam ability
    pub const BEAM_INTERVAL: f32 = 7.0;
    pub const BEAM_DURATION: f32 = 2.2;
    pub const BEAM_RANGE: f32 = 520.0;
    pub const BEAM_HALF_WIDTH: f32 = 26.0;
    pub const BEAM_DPS: f32 = 30.0;
    /// Link: soul-linked escort count
    pub const LINK_MEMBERS: usize = 3;
}

/// Reward and leveling constants
pub mod reward {
    /// Souls granted per normal kill before multipliers
    pub const BASE_SOULS: f32 = 1.0;
    /// Elite reward multiplier
    pub const ELITE_MULT: f32 = 5.0;
    /// Flat reward for a captured snitch
    pub const SNITCH_SOULS: f32 = 25.0;
    /// Flat rewards per unique kind are defined on the kind itself
    /// XP needed for the first level
    pub const XP_BASE_NEEDED: f32 = 10.0;
    /// Per-level XP requirement growth factor
    pub const XP_GROWTH: f32 = 1.10;
}

/// Director / wave scheduler constants
pub mod director {
    /// Seconds per active-shape rotation step
    pub const SHAPE_ROTATION_SECS: f32 = 60.0;
    /// Seconds per palette era step
    pub const ERA_INTERVAL_SECS: f32 = 300.0;
    /// Seconds per pulse/animation speed tier
    pub const PULSE_TIER_SECS: f32 = 180.0;
    /// Base spawns per second at minute zero
    pub const SPAWN_BASE: f32 = 0.8;
    /// Spawn-rate ramp added per completed minute tier
    pub const SPAWN_RAMP_PER_TIER: f32 = 0.25;
    /// Seconds per spawn ramp tier
    pub const SPAWN_TIER_SECS: f32 = 60.0;
    /// Spawn-rate multiplier while extraction is active
    pub const EXTRACTION_RAMP: f32 = 2.0;
    /// Boss cadence: trigger offsets (minutes) inside each cycle, sorted
    pub const BOSS_OFFSETS_MIN: [f32; 3] = [2.0, 5.0, 8.0];
    /// Boss cycle length in minutes
    pub const BOSS_CYCLE_MIN: f32 = 10.0;
    /// Scripted legion events fire at these minutes
    pub const LEGION_EVENT_MIN: [f32; 2] = [3.0, 7.5];
    /// Scripted horde events fire at these minutes
    pub const HORDE_EVENT_MIN: [f32; 2] = [4.5, 9.0];
    /// Horde burst size
    pub const HORDE_COUNT: u32 = 40;
    /// Chance per minute window that a unique spawn is scheduled
    pub const UNIQUE_ROLL_CHANCE: f64 = 0.35;
}

/// Area effect constants
pub mod area {
    /// Player nova: pulse cadence and per-level damage
    pub const NOVA_PULSE_INTERVAL: f32 = 0.9;
    pub const NOVA_BASE_DAMAGE: f32 = 8.0;
    pub const NOVA_DAMAGE_PER_LEVEL: f32 = 4.0;
    pub const NOVA_RADIUS: f32 = 160.0;
    pub const NOVA_DURATION: f32 = 5.0;
    /// Contagion cloud pulse damage
    pub const CONTAGION_PULSE_DAMAGE: f32 = 6.0;
}

/// Enemy max HP after `seconds` of game time.
///
/// Linear-in-minutes growth raised to a power; the exponent keeps late
/// waves threatening without retuning per-shape baselines.
#[inline]
pub fn enemy_max_hp(base: f32, seconds: f64) -> f32 {
    let minutes = (seconds / 60.0) as f32;
    base * (1.0 + minutes * enemy::HP_MINUTE_SCALE).powf(enemy::HP_TIME_EXPONENT)
}

/// Default contact damage for an enemy with the given max HP
#[inline]
pub fn contact_damage_for(max_hp: f32) -> f32 {
    combat::CONTACT_COEFF * max_hp.max(0.0).powf(combat::CONTACT_POWER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enemy_hp_grows_with_time() {
        let at_zero = enemy_max_hp(enemy::BASE_HP, 0.0);
        let at_five = enemy_max_hp(enemy::BASE_HP, 300.0);
        let at_ten = enemy_max_hp(enemy::BASE_HP, 600.0);
        assert!((at_zero - enemy::BASE_HP).abs() < 1e-3);
        assert!(at_five > at_zero);
        assert!(at_ten > at_five);
    }

    #[test]
    fn test_contact_damage_power_law() {
        // 1.8 * 100^0.35 ~= 9.0
        let dmg = contact_damage_for(100.0);
        assert!(dmg > 8.0 && dmg < 10.5, "got {}", dmg);
        // Monotonic in max HP
        assert!(contact_damage_for(400.0) > dmg);
        // Degenerate input does not produce NaN
        assert!(!contact_damage_for(-5.0).is_nan());
    }

    #[test]
    fn test_ring_hysteresis_gap() {
        assert!(ring::FUSE_THRESHOLD as f32 > ring::UNFUSE_AMMO);
    }

    #[test]
    fn test_boss_offsets_sorted_within_cycle() {
        let offsets = director::BOSS_OFFSETS_MIN;
        for pair in offsets.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert!(*offsets.last().unwrap() < director::BOSS_CYCLE_MIN);
    }

    #[test]
    fn test_xp_growth_above_one() {
        assert!(reward::XP_GROWTH > 1.0);
    }
}
