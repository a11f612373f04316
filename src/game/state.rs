//! World state definitions.
//!
//! Contains all entities (player, enemies, projectiles, area effects) plus
//! the per-match bookkeeping the systems mutate. Cross-entity links (legion
//! leader, worm prev/next, soul-link host) are ids resolved through the
//! world on every use - never owning references - so a stale link degrades
//! to `None` instead of dangling.

use hashbrown::HashMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::config::BalanceConfig;
use crate::game::constants::{boss, legion, player as pc, reward, worm};
use crate::game::spatial::SpatialGrid;
use crate::util::vec2::Vec2;

/// Unique player identifier
pub type PlayerId = Uuid;

/// Entity identifier for enemies, projectiles, and area effects.
/// Allocated monotonically by the world and never reused.
pub type EntityId = u64;

/// Legion formation identifier
pub type LegionId = u32;

/// Worm chain identifier
pub type ChainId = u32;

/// Merge cluster identifier
pub type ClusterId = u32;

// ============================================================================
// Player
// ============================================================================

/// One scalar stat resolved from layered sources.
///
/// `base` is the class baseline, `flat`/`mult_pct` come from in-match level
/// ups, `hex_flat`/`hex_mult` from hex modifiers. The progression layer adds
/// its own flat bonus at resolve time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatBlock {
    pub base: f32,
    pub flat: f32,
    pub mult_pct: f32,
    pub hex_flat: f32,
    pub hex_mult: f32,
}

impl StatBlock {
    pub fn new(base: f32) -> Self {
        Self {
            base,
            flat: 0.0,
            mult_pct: 0.0,
            hex_flat: 0.0,
            hex_mult: 0.0,
        }
    }

    /// The single stat formula: flats sum, then percentages apply together
    pub fn resolve(&self, bonus_flat: f32) -> f32 {
        (self.base + self.flat + self.hex_flat + bonus_flat)
            * (1.0 + (self.mult_pct + self.hex_mult) / 100.0)
    }
}

/// Player stat blocks, one per scalar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStats {
    pub max_hp: StatBlock,
    pub damage: StatBlock,
    pub attack_rate: StatBlock,
    pub armor: StatBlock,
    pub regen: StatBlock,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            max_hp: StatBlock::new(pc::BASE_HP),
            damage: StatBlock::new(pc::BASE_DAMAGE),
            attack_rate: StatBlock::new(pc::BASE_ATTACK_RATE),
            armor: StatBlock::new(pc::BASE_ARMOR),
            regen: StatBlock::new(pc::BASE_REGEN),
        }
    }
}

/// A temporary absorption pool applied before HP loss
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ShieldChunk {
    pub amount: f32,
    pub expires_at: f64,
}

/// Active skill slots on cooldown timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillKind {
    /// Pulsing damage nova around the player
    Nova,
    /// Short intangibility window
    PhaseShift,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SkillSlot {
    pub kind: SkillKind,
    pub cooldown: f32,
    pub ready_at: f64,
    pub level: u8,
}

/// Cached resolved stats, synced once per tick before the resolver runs
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResolvedStats {
    pub max_hp: f32,
    pub damage: f32,
    pub attack_rate: f32,
    pub armor: f32,
    /// Armor reduction cap, raised by a specific upgrade
    pub armor_cap: f32,
    pub regen: f32,
}

/// Player state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub position: Vec2,
    /// Normalized movement input for this tick, set by the driver
    pub move_dir: Vec2,
    /// Aim direction for auto-fire, set by the driver (falls back to the
    /// nearest enemy when zero)
    pub aim: Vec2,
    /// Knockback velocity, decays exponentially
    pub knockback: Vec2,
    pub hp: f32,
    pub stats: PlayerStats,
    /// Stats resolved through the stat formula + progression bonuses,
    /// refreshed at the start of every tick
    pub resolved: ResolvedStats,
    /// Absorption chunks, consumed soonest-expiry-first
    pub shields: SmallVec<[ShieldChunk; 4]>,
    pub skills: Vec<SkillSlot>,
    // Status timers, stored as simulation-clock deadlines
    pub stunned_until: f64,
    pub invincible_until: f64,
    pub phase_shift_until: f64,
    /// Last-chance revive charges
    pub guard_charges: u8,
    /// Seconds until the next auto-attack
    pub attack_timer: f32,
}

impl Player {
    pub fn new(id: PlayerId) -> Self {
        let stats = PlayerStats::default();
        Self {
            id,
            position: Vec2::ZERO,
            move_dir: Vec2::ZERO,
            aim: Vec2::ZERO,
            knockback: Vec2::ZERO,
            hp: stats.max_hp.resolve(0.0),
            stats,
            resolved: ResolvedStats::default(),
            shields: SmallVec::new(),
            skills: vec![
                SkillSlot {
                    kind: SkillKind::Nova,
                    cooldown: 9.0,
                    ready_at: 0.0,
                    level: 1,
                },
                SkillSlot {
                    kind: SkillKind::PhaseShift,
                    cooldown: 14.0,
                    ready_at: 0.0,
                    level: 1,
                },
            ],
            stunned_until: 0.0,
            invincible_until: 0.0,
            phase_shift_until: 0.0,
            guard_charges: 0,
            attack_timer: 0.0,
        }
    }

    pub fn is_invincible(&self, now: f64) -> bool {
        now < self.invincible_until || now < self.phase_shift_until
    }

    pub fn is_stunned(&self, now: f64) -> bool {
        now < self.stunned_until
    }

    /// Total live shield at `now`
    pub fn total_shield(&self, now: f64) -> f32 {
        self.shields
            .iter()
            .filter(|c| c.expires_at > now)
            .map(|c| c.amount)
            .sum()
    }

    /// Drop expired chunks
    pub fn prune_shields(&mut self, now: f64) {
        self.shields.retain(|c| c.expires_at > now && c.amount > 0.0);
    }

    /// Absorb incoming damage into shield chunks, soonest expiry first.
    /// Returns the damage remaining after absorption.
    pub fn absorb_with_shields(&mut self, mut damage: f32, now: f64) -> f32 {
        self.prune_shields(now);
        self.shields
            .sort_by(|a, b| a.expires_at.partial_cmp(&b.expires_at).unwrap_or(std::cmp::Ordering::Equal));
        for chunk in self.shields.iter_mut() {
            if damage <= 0.0 {
                break;
            }
            let used = chunk.amount.min(damage);
            chunk.amount -= used;
            damage -= used;
        }
        self.shields.retain(|c| c.amount > 0.0);
        damage
    }

    /// Add a shield chunk, respecting the overflow cap relative to max HP
    pub fn add_shield_chunk(&mut self, amount: f32, duration: f32, now: f64) {
        let cap = self.resolved.max_hp * pc::OVERFLOW_SHIELD_CAP_RATIO;
        let current = self.total_shield(now);
        let granted = amount.min((cap - current).max(0.0));
        if granted > 0.0 {
            self.shields.push(ShieldChunk {
                amount: granted,
                expires_at: now + duration as f64,
            });
        }
    }
}

// ============================================================================
// Enemies
// ============================================================================

/// Enemy body shape, the primary behavioral category for normal enemies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    Circle,
    Triangle,
    Square,
    Pentagon,
    Star,
}

impl Shape {
    pub const ALL: [Shape; 5] = [
        Shape::Circle,
        Shape::Triangle,
        Shape::Square,
        Shape::Pentagon,
        Shape::Star,
    ];

    /// Base movement speed in units per second
    pub fn base_speed(&self) -> f32 {
        match self {
            Shape::Circle => 80.0,
            Shape::Triangle => 120.0,
            Shape::Square => 55.0,
            Shape::Pentagon => 70.0,
            Shape::Star => 95.0,
        }
    }

    /// Base collision size (radius)
    pub fn base_size(&self) -> f32 {
        match self {
            Shape::Circle => 16.0,
            Shape::Triangle => 13.0,
            Shape::Square => 22.0,
            Shape::Pentagon => 19.0,
            Shape::Star => 15.0,
        }
    }

    /// HP multiplier over the time-scaled baseline
    pub fn hp_mult(&self) -> f32 {
        match self {
            Shape::Circle => 1.0,
            Shape::Triangle => 0.7,
            Shape::Square => 2.2,
            Shape::Pentagon => 1.5,
            Shape::Star => 0.9,
        }
    }

    /// Spawn weight applied to the director's spawn rate
    pub fn spawn_weight(&self) -> f32 {
        match self {
            Shape::Circle => 1.0,
            Shape::Triangle => 1.2,
            Shape::Square => 0.6,
            Shape::Pentagon => 0.8,
            Shape::Star => 0.9,
        }
    }

    /// Same-shape neighbors required before a merge cluster forms
    pub fn merge_threshold(&self) -> usize {
        match self {
            Shape::Circle => 6,
            Shape::Triangle => 5,
            Shape::Square => 3,
            Shape::Pentagon => 4,
            Shape::Star => 5,
        }
    }
}

/// Flanking overlay: approach via an offset point beside the player
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Flank {
    /// Angle offset from the player-to-enemy axis, radians (signed)
    pub angle: f32,
    /// Distance at which the offset point is held
    pub distance: f32,
}

/// Merge cluster membership tag
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClusterTag {
    pub cluster: ClusterId,
}

/// Damage-sharing link: total damage splits across host + peers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoulLink {
    pub host: Option<EntityId>,
    pub peers: SmallVec<[EntityId; 4]>,
}

/// Boss base-cycle phase, gated by stored deadlines
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum BossPhase {
    Chase { until: f64 },
    LockOn { until: f64, target: Vec2 },
    Dash { until: f64, dir: Vec2 },
    Cooldown { until: f64 },
}

/// Orthogonal ability layered on top of the base cycle by boss tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BossAbility {
    None,
    /// Suction toward the boss within a radius
    Pull,
    /// Orbiting shield satellites (spawned as Satellite-role enemies)
    Shield { satellites: SmallVec<[EntityId; 4]> },
    /// Reflects player projectiles in a bubble, or by chance while dashing
    Deflect,
    /// Periodic sweeping beam
    Beam { next_at: f64 },
    /// Soul-linked escorts that split the boss's incoming damage
    Link { members: SmallVec<[EntityId; 4]> },
}

/// Boss archetype state: tier, phase machine, layered ability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BossState {
    pub tier: u8,
    pub phase: BossPhase,
    pub ability: BossAbility,
}

/// Worm head phase cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum WormPhase {
    /// Stalking/charging the player on the surface
    Surface { until: f64 },
    /// Transition below ground
    Digging { until: f64 },
    /// Regenerating and wandering below ground, can grow segments
    Underground { until: f64, wander: Vec2 },
    /// Bursting up, knocking back a close player
    Erupting { until: f64 },
}

/// Worm head bookkeeping: the rolling history trailing segments follow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WormHead {
    pub phase: WormPhase,
    /// Most recent position first
    pub history: Vec<Vec2>,
    pub next_grow_at: f64,
}

impl WormHead {
    pub fn new(position: Vec2, now: f64) -> Self {
        Self {
            phase: WormPhase::Surface {
                until: now + worm::SURFACE_DURATION as f64,
            },
            history: vec![position],
            next_grow_at: now + worm::GROW_INTERVAL as f64,
        }
    }

    /// Push the newest head position, truncating the rolling buffer
    pub fn record(&mut self, position: Vec2) {
        self.history.insert(0, position);
        self.history.truncate(worm::HISTORY_CAP);
    }

    /// History sample for a segment `order` places behind the head
    pub fn sample(&self, order: u16) -> Option<Vec2> {
        self.history.get(order as usize * worm::SEGMENT_LAG).copied()
    }
}

/// Worm chain segment links. `head` is `Some` only on the chain's head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WormSeg {
    pub chain: ChainId,
    /// Position in the chain: 0 = head, grows toward the tail
    pub order: u16,
    pub prev: Option<EntityId>,
    pub next: Option<EntityId>,
    pub head: Option<WormHead>,
}

impl WormSeg {
    pub fn is_head(&self) -> bool {
        self.head.is_some()
    }
}

/// Scripted unique enemy kinds, each with bespoke rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UniqueKind {
    /// Slow juggernaut; contact damage is a fixed fraction of player max HP
    Crusher,
    /// On death schedules a hostile rise of minions at its grave
    Gravedigger,
    /// Periodically summons minions while alive
    Broodmother,
}

impl UniqueKind {
    pub const ALL: [UniqueKind; 3] = [
        UniqueKind::Crusher,
        UniqueKind::Gravedigger,
        UniqueKind::Broodmother,
    ];

    /// Flat soul reward for the kill
    pub fn reward_souls(&self) -> f32 {
        match self {
            UniqueKind::Crusher => 40.0,
            UniqueKind::Gravedigger => 30.0,
            UniqueKind::Broodmother => 35.0,
        }
    }

    pub fn hp_mult(&self) -> f32 {
        match self {
            UniqueKind::Crusher => 25.0,
            UniqueKind::Gravedigger => 12.0,
            UniqueKind::Broodmother => 15.0,
        }
    }
}

/// Archetype payload. Selecting behavior by variant keeps dispatch
/// exhaustive when new archetypes are added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Role {
    Normal,
    Elite { thorns: bool },
    /// Rare runner ("snitch"): flees the player, despawns if not caught
    Rare { despawn_at: f64 },
    /// Summoned minion; owner may be gone
    Minion { owner: Option<EntityId> },
    /// Orbiting shield satellite attached to a boss
    Satellite { owner: EntityId, angle: f32 },
    Unique { kind: UniqueKind, next_summon_at: f64 },
    Boss(BossState),
    LegionLeader { legion: LegionId, shield: f32 },
    LegionMember { legion: LegionId, slot: u8 },
    WormSegment(WormSeg),
}

/// Enemy record: shared fields plus the archetype payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enemy {
    pub id: EntityId,
    pub shape: Shape,
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: f32,
    pub speed: f32,
    pub hp: f32,
    pub max_hp: f32,
    /// Palette era tag assigned at spawn, consumed by the renderer
    pub era: u8,
    /// Terminal and idempotent: no observable mutation after death
    pub dead: bool,
    /// Transient "takes more damage" debuff, reset to 1.0 at tick start for
    /// non-boss entities so a missed reapplication decays on its own
    pub taken_damage_mult: f32,
    /// Crit-amplification window deadline (simulation clock)
    pub marked_until: f64,
    /// Earliest time this enemy may deal contact damage again
    pub contact_ready_at: f64,
    /// Reward multiplier accumulated by promotions (merge, legion)
    pub reward_mult: f32,
    /// Contagion carrier: death spreads infection nearby
    pub infected: bool,
    pub flank: Option<Flank>,
    pub cluster: Option<ClusterTag>,
    pub soul_link: Option<SoulLink>,
    pub role: Role,
}

impl Enemy {
    /// Plain mob of the given shape; stats pre-scaled by the caller
    pub fn normal(id: EntityId, shape: Shape, position: Vec2, max_hp: f32, era: u8) -> Self {
        Self {
            id,
            shape,
            position,
            velocity: Vec2::ZERO,
            size: shape.base_size(),
            speed: shape.base_speed(),
            hp: max_hp,
            max_hp,
            era,
            dead: false,
            taken_damage_mult: 1.0,
            marked_until: 0.0,
            contact_ready_at: 0.0,
            reward_mult: 1.0,
            infected: false,
            flank: None,
            cluster: None,
            soul_link: None,
            role: Role::Normal,
        }
    }

    pub fn is_boss(&self) -> bool {
        matches!(self.role, Role::Boss(_))
    }

    /// True while the archetype is executing a maneuver that the flanker
    /// overlay must not override
    pub fn has_special_maneuver(&self) -> bool {
        match &self.role {
            Role::Boss(state) => !matches!(state.phase, BossPhase::Chase { .. }),
            Role::WormSegment(seg) => match &seg.head {
                Some(head) => !matches!(head.phase, WormPhase::Surface { .. }),
                None => true, // trailing segments always follow the chain
            },
            Role::Satellite { .. } => true,
            _ => false,
        }
    }

    /// Legion id regardless of leadership
    pub fn legion_id(&self) -> Option<LegionId> {
        match self.role {
            Role::LegionLeader { legion, .. } => Some(legion),
            Role::LegionMember { legion, .. } => Some(legion),
            _ => None,
        }
    }

    /// Eligible for merge clustering: plain normals without links
    pub fn mergeable(&self) -> bool {
        matches!(self.role, Role::Normal) && self.cluster.is_none() && self.soul_link.is_none()
    }
}

// ============================================================================
// Projectiles
// ============================================================================

/// Which side a projectile damages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Player,
    Enemy,
}

/// Archetype-specific projectile extension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProjectileKind {
    Standard,
    /// Individual orbiting projectile feeding the ring weapon
    Orbiter { angle: f32 },
    /// Fused ring: pooled ammo/damage, annulus collision
    Ring { ammo: f32, avg_damage: f32, pulse_timer: f32 },
    /// Bounces off the arena boundary
    Bouncer { bounces_left: u8 },
    /// Curves toward the nearest enemy
    Homing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projectile {
    pub id: EntityId,
    pub owner: Side,
    pub position: Vec2,
    pub velocity: Vec2,
    pub damage: f32,
    /// Remaining pierce budget; negative means infinite
    pub pierce: i32,
    /// Remaining lifetime in seconds
    pub life: f32,
    /// Enemy ids already damaged, for pierce dedup
    #[serde(skip)]
    pub hits: FxHashSet<EntityId>,
    pub kind: ProjectileKind,
}

impl Projectile {
    pub fn standard(id: EntityId, owner: Side, position: Vec2, velocity: Vec2, damage: f32, pierce: i32) -> Self {
        Self {
            id,
            owner,
            position,
            velocity,
            damage,
            pierce,
            life: crate::game::constants::projectile::LIFETIME,
            hits: FxHashSet::default(),
            kind: ProjectileKind::Standard,
        }
    }

    pub fn infinite_pierce(&self) -> bool {
        self.pierce < 0
    }
}

// ============================================================================
// Area effects
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AreaEffectKind {
    /// Player nova: periodic damage pulse, scales with skill level
    Nova { level: u8, pulse_timer: f32 },
    /// Infection cloud left by a contagious death
    Contagion { pulse_timer: f32 },
    /// Boss beam: a rotating damage sector anchored to its owner
    Beam { owner: EntityId, angle: f32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaEffect {
    pub id: EntityId,
    pub position: Vec2,
    pub radius: f32,
    pub remaining: f32,
    pub kind: AreaEffectKind,
}

// ============================================================================
// Derived caches and scripted work
// ============================================================================

/// Live members of one legion, leader first
#[derive(Debug, Clone, Default)]
pub struct LegionGroup {
    pub leader: Option<EntityId>,
    pub members: Vec<EntityId>,
}

/// Legion id -> live leader + member list.
///
/// Rebuilt at the start of every `advance` and passed down; never cached
/// across ticks (members die mid-tick, the next tick re-derives).
#[derive(Debug, Clone, Default)]
pub struct LegionRoster {
    pub groups: HashMap<LegionId, LegionGroup>,
}

impl LegionRoster {
    pub fn build(enemies: &HashMap<EntityId, Enemy>) -> Self {
        let mut groups: HashMap<LegionId, LegionGroup> = HashMap::new();
        for enemy in enemies.values() {
            if enemy.dead {
                continue;
            }
            match enemy.role {
                Role::LegionLeader { legion, .. } => {
                    groups.entry(legion).or_default().leader = Some(enemy.id);
                }
                Role::LegionMember { legion, .. } => {
                    groups.entry(legion).or_default().members.push(enemy.id);
                }
                _ => {}
            }
        }
        Self { groups }
    }

    pub fn leader_of(&self, legion: LegionId) -> Option<EntityId> {
        self.groups.get(&legion).and_then(|g| g.leader)
    }
}

/// Scripted spawn events, flagged by the director and consumed exactly once
/// by the AI layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptedEvent {
    Legion { center: Vec2 },
    Horde { count: u32 },
    WormNest { position: Vec2 },
}

/// Deferred side effects scheduled by the death pipeline
#[derive(Debug, Clone, Copy)]
pub enum PendingEffect {
    /// Raise minions at a grave site after a delay
    Rise { at: f64, position: Vec2, count: u32 },
}

/// Merge cluster tracked by the clustering system
#[derive(Debug, Clone)]
pub struct MergeCluster {
    pub id: ClusterId,
    pub shape: Shape,
    pub members: Vec<EntityId>,
    /// Promotion deadline
    pub merge_at: f64,
}

/// Director bookkeeping carried across ticks
#[derive(Debug, Clone, Default)]
pub struct DirectorState {
    /// Fractional spawns carried between ticks
    pub spawn_accumulator: f32,
    /// Current palette era, written every tick for other spawners to tag with
    pub era_hint: u8,
    /// (cycle, offset index) of the next boss trigger
    pub next_boss: (u32, usize),
    /// Minute windows already rolled for a unique spawn
    pub unique_rolled_window: i64,
    /// Scheduled unique fire time inside the current window
    pub unique_fire_at: Option<(f64, UniqueKind)>,
    /// Scripted events already fired, by constant index
    pub legion_fired: [bool; 2],
    pub horde_fired: [bool; 2],
    pub worm_nest_spawned: bool,
}

// ============================================================================
// Match state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MatchPhase {
    Countdown { until: f64 },
    Playing,
    /// Terminal: simulation mutation halts, render may keep the snapshot
    Ended { victory: bool },
}

impl MatchPhase {
    pub fn is_over(&self) -> bool {
        matches!(self, MatchPhase::Ended { .. })
    }
}

/// Host-authoritative asymmetry, decided once per tick per entity class.
///
/// Guests run only their own player prediction; all shared entities are
/// mutated host-side and arrive via snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Authority {
    Host,
    Guest,
}

impl Authority {
    #[inline]
    pub fn simulates_shared(&self) -> bool {
        matches!(self, Authority::Host)
    }
}

/// Player XP track
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct XpState {
    pub current: f32,
    pub needed: f32,
    pub level: u32,
}

impl Default for XpState {
    fn default() -> Self {
        Self {
            current: 0.0,
            needed: reward::XP_BASE_NEEDED,
            level: 1,
        }
    }
}

/// Lifetime kill counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct KillCounters {
    pub total: u64,
    pub elites: u64,
    pub bosses: u64,
    pub snitches: u64,
}

// ============================================================================
// World
// ============================================================================

/// The whole simulation state. `advance` is its single writer per tick.
#[derive(Debug)]
pub struct World {
    /// Simulation clock in seconds; all deadlines compare against this
    pub clock: f64,
    pub tick: u64,
    pub phase: MatchPhase,
    pub authority: Authority,
    /// Extraction urgency: spawn rates ramp while active
    pub extraction_active: bool,
    /// Neutral mission state: kills feed the player XP track. Scripted
    /// missions that redirect progression clear this.
    pub mission_neutral: bool,
    pub arena_radius: f32,
    /// Balance knobs resolved at match start
    pub balance: BalanceConfig,

    pub player: Player,
    pub enemies: HashMap<EntityId, Enemy>,
    pub projectiles: Vec<Projectile>,
    pub effects: Vec<AreaEffect>,

    /// Rebuilt inside the tick wherever proximity queries are needed
    pub grid: SpatialGrid,

    pub director: DirectorState,
    pub clusters: HashMap<ClusterId, MergeCluster>,
    /// Global cooldown gate for cluster scans
    pub merge_scan_at: f64,
    pub pending_scripts: Vec<ScriptedEvent>,
    pub pending_effects: Vec<PendingEffect>,

    pub xp: XpState,
    pub souls: f64,
    pub kills: KillCounters,

    next_entity_id: EntityId,
    next_legion_id: LegionId,
    next_chain_id: ChainId,
    next_cluster_id: ClusterId,
}

impl World {
    pub fn new(authority: Authority) -> Self {
        Self::with_config(authority, BalanceConfig::default())
    }

    pub fn with_config(authority: Authority, balance: BalanceConfig) -> Self {
        Self {
            clock: 0.0,
            tick: 0,
            phase: MatchPhase::Playing,
            authority,
            extraction_active: false,
            mission_neutral: true,
            arena_radius: balance.arena_radius,
            balance,
            player: Player::new(Uuid::new_v4()),
            enemies: HashMap::new(),
            projectiles: Vec::new(),
            effects: Vec::new(),
            grid: SpatialGrid::new(),
            director: DirectorState::default(),
            clusters: HashMap::new(),
            merge_scan_at: 0.0,
            pending_scripts: Vec::new(),
            pending_effects: Vec::new(),
            xp: XpState::default(),
            souls: 0.0,
            kills: KillCounters::default(),
            next_entity_id: 1,
            next_legion_id: 1,
            next_chain_id: 1,
            next_cluster_id: 1,
        }
    }

    /// Allocate a monotonically increasing entity id, never reused
    pub fn alloc_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    pub fn alloc_legion_id(&mut self) -> LegionId {
        let id = self.next_legion_id;
        self.next_legion_id += 1;
        id
    }

    pub fn alloc_chain_id(&mut self) -> ChainId {
        let id = self.next_chain_id;
        self.next_chain_id += 1;
        id
    }

    pub fn alloc_cluster_id(&mut self) -> ClusterId {
        let id = self.next_cluster_id;
        self.next_cluster_id += 1;
        id
    }

    /// Live-enemy lookup; dead entities resolve to `None` so stale links
    /// degrade instead of mutating a corpse
    pub fn enemy(&self, id: EntityId) -> Option<&Enemy> {
        self.enemies.get(&id).filter(|e| !e.dead)
    }

    pub fn enemy_mut(&mut self, id: EntityId) -> Option<&mut Enemy> {
        self.enemies.get_mut(&id).filter(|e| !e.dead)
    }

    pub fn spawn_enemy(&mut self, enemy: Enemy) -> EntityId {
        let id = enemy.id;
        self.enemies.insert(id, enemy);
        id
    }

    pub fn add_projectile(&mut self, projectile: Projectile) -> EntityId {
        let id = projectile.id;
        self.projectiles.push(projectile);
        id
    }

    pub fn add_effect(&mut self, effect: AreaEffect) -> EntityId {
        let id = effect.id;
        self.effects.push(effect);
        id
    }

    /// Count of live (not yet compacted, not dead) enemies
    pub fn live_enemy_count(&self) -> usize {
        self.enemies.values().filter(|e| !e.dead).count()
    }

    /// True when a live unique of this kind exists (uniques are singletons)
    pub fn unique_alive(&self, kind: UniqueKind) -> bool {
        self.enemies
            .values()
            .any(|e| !e.dead && matches!(e.role, Role::Unique { kind: k, .. } if k == kind))
    }

    /// Boss tier implied by game time when not assigned explicitly
    pub fn time_based_boss_tier(&self) -> u8 {
        ((self.clock as f32 / boss::TIER_TIME_STEP) as u8).saturating_add(1)
    }

    /// Drop dead enemies and expired projectiles/effects.
    /// Runs after all forward scans of the tick have completed.
    pub fn compact(&mut self) {
        self.enemies.retain(|_, e| !e.dead);
        self.projectiles.retain(|p| p.life > 0.0);
        self.effects.retain(|a| a.remaining > 0.0);
    }
}

/// Grid of legion slot offsets around a formation center
pub fn legion_slot_offset(slot: u8) -> Vec2 {
    let col = (slot % legion::COLS) as f32;
    let row = (slot / legion::COLS) as f32;
    let half_cols = (legion::COLS - 1) as f32 / 2.0;
    let half_rows = (legion::ROWS - 1) as f32 / 2.0;
    Vec2::new(
        (col - half_cols) * legion::SLOT_SPACING,
        (row - half_rows) * legion::SLOT_SPACING,
    )
}
