//! Battlefield participants.
//!
//! This module contains:
//! - `EntityKind` and `EntityId` (stable, never reused identity)
//! - `Entity` with typed optional components (health, cooldowns, abilities)
//! - `Templates` holding per-type defaults, loadable from JSON
//! - `EntityFactory` which merges templates with overrides and assigns ids
//!
//! Entities compare equal by id alone, so lookups and removals by value stay
//! correct while other attributes change.

use crate::abilities::Ability;
use crate::actions::Action;
use crate::board::Board;
use crate::hex::HexCoord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Types of battlefield participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// The player-controlled hero
    Hero,
    /// Melee enemy
    Footman,
    /// Ranged enemy firing along straight lines
    Archer,
    /// Beam caster with a cooldown
    Wizard,
    /// Throws bombs over obstacles
    Bomber,
    /// Explodes on its turn, damaging everything around it
    Bomb,
}

impl EntityKind {
    /// All entity kinds
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Hero,
        EntityKind::Footman,
        EntityKind::Archer,
        EntityKind::Wizard,
        EntityKind::Bomber,
        EntityKind::Bomb,
    ];

    /// Name used in ids and records
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Hero => "Hero",
            EntityKind::Footman => "Footman",
            EntityKind::Archer => "Archer",
            EntityKind::Wizard => "Wizard",
            EntityKind::Bomber => "Bomber",
            EntityKind::Bomb => "Bomb",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TemplateError::UnknownEntityType(s.to_string()))
    }
}

/// Stable entity identity, rendered as `"<Type>-<n>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    kind: EntityKind,
    serial: u32,
}

impl EntityId {
    pub const fn new(kind: EntityKind, serial: u32) -> Self {
        Self { kind, serial }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind, self.serial)
    }
}

impl FromStr for EntityId {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, serial) = s
            .rsplit_once('-')
            .ok_or_else(|| TemplateError::MalformedId(s.to_string()))?;
        let serial = serial
            .parse()
            .map_err(|_| TemplateError::MalformedId(s.to_string()))?;
        Ok(EntityId::new(kind.parse()?, serial))
    }
}

impl TryFrom<String> for EntityId {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

/// Team tag. Entities on different teams are enemies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Team(String);

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an entity's decisions come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Control {
    /// Chooses from its own ability list
    #[default]
    Autonomous,
    /// Waits for an externally supplied action
    Directed,
}

/// Remaining cooldown per gated ability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cooldowns(BTreeMap<Ability, u32>);

impl Cooldowns {
    /// Remaining turns before `ability` can fire again
    pub fn remaining(&self, ability: Ability) -> u32 {
        self.0.get(&ability).copied().unwrap_or(0)
    }

    /// Whether `ability` is suppressed
    pub fn is_cooling(&self, ability: Ability) -> bool {
        self.remaining(ability) > 0
    }

    /// Whether any counter is still running
    pub fn any_active(&self) -> bool {
        self.0.values().any(|&turns| turns > 0)
    }

    pub(crate) fn set(&mut self, ability: Ability, turns: u32) {
        self.0.insert(ability, turns);
    }

    /// Decrement every running counter by one
    pub(crate) fn tick(&mut self) {
        for turns in self.0.values_mut() {
            *turns = turns.saturating_sub(1);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ability, u32)> + '_ {
        self.0.iter().map(|(ability, turns)| (*ability, *turns))
    }
}

/// A battlefield participant
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    team: Team,
    health: Option<i32>,
    abilities: Vec<Ability>,
    cooldowns: Cooldowns,
    control: Control,
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Entity {}

impl Entity {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.id.kind
    }

    pub fn team(&self) -> &Team {
        &self.team
    }

    /// Health counter, `None` for entities that cannot be attacked
    pub fn health(&self) -> Option<i32> {
        self.health
    }

    /// Whether attacks can hurt this entity
    pub fn has_health(&self) -> bool {
        self.health.is_some()
    }

    /// Ability tags in declared (priority) order
    pub fn abilities(&self) -> &[Ability] {
        &self.abilities
    }

    pub fn has_ability(&self, ability: Ability) -> bool {
        self.abilities.contains(&ability)
    }

    pub fn cooldowns(&self) -> &Cooldowns {
        &self.cooldowns
    }

    pub fn control(&self) -> Control {
        self.control
    }

    /// Whether a Bash can push this entity
    pub fn is_displaceable(&self) -> bool {
        self.has_ability(Ability::Bashable)
    }

    /// Whether `other` is on an opposing team
    pub fn is_enemy_of(&self, other: &Entity) -> bool {
        self.team != other.team
    }

    pub(crate) fn health_mut(&mut self) -> Option<&mut i32> {
        self.health.as_mut()
    }

    pub(crate) fn cooldowns_mut(&mut self) -> &mut Cooldowns {
        &mut self.cooldowns
    }

    pub(crate) fn replace_cooldowns(&mut self, cooldowns: Cooldowns) {
        self.cooldowns = cooldowns;
    }

    /// Ask this entity for its root actions.
    ///
    /// Autonomous entities commit to the first ability with a non-empty
    /// proposal and fall back to a Null action, so they always act. Directed
    /// entities return the supplied input, or `None` when nothing has been
    /// supplied yet.
    pub fn decide(
        &self,
        origin: HexCoord,
        board: &Board,
        input: &mut Option<Action>,
    ) -> Option<Vec<Action>> {
        match self.control {
            Control::Directed => input.take().map(|action| vec![action]),
            Control::Autonomous => {
                for ability in &self.abilities {
                    let proposed = ability.propose(self, origin, board);
                    if !proposed.is_empty() {
                        return Some(proposed);
                    }
                }
                Some(vec![Action::null(self.id, origin)])
            }
        }
    }

    /// Cells this entity could attack from where it stands
    pub fn threatened_cells(&self, board: &Board) -> BTreeSet<HexCoord> {
        let Some(origin) = board.find(self.id) else {
            return BTreeSet::new();
        };
        self.abilities
            .iter()
            .flat_map(|ability| ability.threatened_cells(origin, board))
            .collect()
    }

    /// Cells from which this entity could strike an enemy
    pub fn targets(&self, board: &Board) -> BTreeSet<HexCoord> {
        self.abilities
            .iter()
            .flat_map(|ability| ability.targets(self, board))
            .collect()
    }

    /// Full descriptor, as written into Spawn records
    pub fn to_record(&self) -> EntityRecord {
        EntityRecord {
            kind: self.kind(),
            id: Some(self.id),
            team: Some(self.team.clone()),
            health: self.health,
            abilities: Some(self.abilities.clone()),
            cooldowns: Some(self.cooldowns.clone()),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.id)
    }
}

/// Errors from ids, templates and entity construction
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unknown entity type '{0}'")]
    UnknownEntityType(String),

    #[error("Malformed entity id '{0}'")]
    MalformedId(String),

    #[error("No template for entity type {0}")]
    MissingTemplate(EntityKind),

    #[error("Entity id {id} does not match type {kind}")]
    IdKindMismatch { id: EntityId, kind: EntityKind },

    #[error("Invalid template JSON: {0}")]
    Json(String),
}

/// Per-type default attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub team: Team,
    #[serde(default)]
    pub health: Option<i32>,
    pub abilities: Vec<Ability>,
    #[serde(default)]
    pub control: Control,
    #[serde(default)]
    pub cooldowns: Cooldowns,
}

impl Template {
    fn new(team: &str, health: Option<i32>, abilities: &[Ability], control: Control) -> Self {
        Self {
            team: Team::new(team),
            health,
            abilities: abilities.to_vec(),
            control,
            cooldowns: Cooldowns::default(),
        }
    }
}

/// Template table keyed by entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Templates(BTreeMap<EntityKind, Template>);

impl Templates {
    /// The built-in roster
    pub fn standard() -> Self {
        use Ability::*;

        let mut table = BTreeMap::new();
        table.insert(
            EntityKind::Hero,
            Template::new(
                "red",
                Some(3),
                &[Move, Jump, Stab, Slash, Lunge, Bash, BlastWave],
                Control::Directed,
            ),
        );
        table.insert(
            EntityKind::Footman,
            Template::new("blue", Some(1), &[Stab, Move, Bashable], Control::Autonomous),
        );
        table.insert(
            EntityKind::Archer,
            Template::new("blue", Some(1), &[Shoot, Move, Bashable], Control::Autonomous),
        );
        table.insert(
            EntityKind::Wizard,
            Template::new(
                "blue",
                Some(1),
                &[WizardsBeam, Move, Bashable],
                Control::Autonomous,
            ),
        );
        table.insert(
            EntityKind::Bomber,
            Template::new(
                "blue",
                Some(1),
                &[ThrowBomb, Move, Bashable],
                Control::Autonomous,
            ),
        );
        table.insert(
            EntityKind::Bomb,
            Template::new("blue", None, &[Explode], Control::Autonomous),
        );
        Templates(table)
    }

    /// Parse a JSON object of templates, layered over the built-in roster.
    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        let overrides: BTreeMap<EntityKind, Template> =
            serde_json::from_str(json).map_err(|e| TemplateError::Json(e.to_string()))?;
        let mut templates = Self::standard();
        templates.0.extend(overrides);
        Ok(templates)
    }

    pub fn get(&self, kind: EntityKind) -> Option<&Template> {
        self.0.get(&kind)
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::standard()
    }
}

/// Logical entity descriptor: a type plus optional overrides.
///
/// This is the nested `element` of a Spawn record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<Team>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abilities: Option<Vec<Ability>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldowns: Option<Cooldowns>,
}

impl EntityRecord {
    /// Descriptor with every attribute taken from the template
    pub fn of(kind: EntityKind) -> Self {
        Self {
            kind,
            id: None,
            team: None,
            health: None,
            abilities: None,
            cooldowns: None,
        }
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(Team::new(team));
        self
    }

    pub fn with_health(mut self, health: i32) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_abilities(mut self, abilities: &[Ability]) -> Self {
        self.abilities = Some(abilities.to_vec());
        self
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Builds entities from templates and hands out per-type serial numbers
#[derive(Debug, Clone, Default)]
pub struct EntityFactory {
    templates: Templates,
    counters: BTreeMap<EntityKind, u32>,
}

impl EntityFactory {
    pub fn new(templates: Templates) -> Self {
        Self {
            templates,
            counters: BTreeMap::new(),
        }
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    /// A fresh entity of `kind` with template attributes
    pub fn create(&mut self, kind: EntityKind) -> Result<Entity, TemplateError> {
        self.build(EntityRecord::of(kind))
    }

    /// Merge a descriptor over its template.
    ///
    /// A supplied id is kept and the counter moves past it; otherwise the
    /// next serial for the type is assigned.
    pub fn build(&mut self, record: EntityRecord) -> Result<Entity, TemplateError> {
        let template = self
            .templates
            .get(record.kind)
            .ok_or(TemplateError::MissingTemplate(record.kind))?
            .clone();

        let id = match record.id {
            Some(id) if id.kind != record.kind => {
                return Err(TemplateError::IdKindMismatch {
                    id,
                    kind: record.kind,
                })
            }
            Some(id) => {
                self.reserve(id);
                id
            }
            None => self.next_id(record.kind),
        };

        let abilities = record.abilities.unwrap_or(template.abilities);
        let mut cooldowns = template.cooldowns;
        if let Some(overrides) = record.cooldowns {
            for (ability, turns) in overrides.iter() {
                cooldowns.set(ability, turns);
            }
        }
        for ability in &abilities {
            if ability.cooldown_period().is_some() && !cooldowns.0.contains_key(ability) {
                cooldowns.set(*ability, 0);
            }
        }

        Ok(Entity {
            id,
            team: record.team.unwrap_or(template.team),
            health: record.health.or(template.health),
            abilities,
            cooldowns,
            control: template.control,
        })
    }

    fn next_id(&mut self, kind: EntityKind) -> EntityId {
        let counter = self.counters.entry(kind).or_insert(0);
        let id = EntityId::new(kind, *counter);
        *counter += 1;
        id
    }

    fn reserve(&mut self, id: EntityId) {
        let counter = self.counters.entry(id.kind).or_insert(0);
        *counter = (*counter).max(id.serial + 1);
    }
}
