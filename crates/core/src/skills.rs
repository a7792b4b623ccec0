use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Every skill the host reports, plus the synthetic `Overall` total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Skill {
    Attack,
    Defence,
    Strength,
    Hitpoints,
    Ranged,
    Prayer,
    Magic,
    Cooking,
    Woodcutting,
    Fletching,
    Fishing,
    Firemaking,
    Crafting,
    Smithing,
    Mining,
    Herblore,
    Agility,
    Thieving,
    Slayer,
    Farming,
    Runecraft,
    Hunter,
    Construction,
    Sailing,
    Overall,
}

impl Skill {
    /// Trackable skills in host order. `Overall` is not among them.
    pub const TRACKED: [Skill; 24] = [
        Skill::Attack,
        Skill::Defence,
        Skill::Strength,
        Skill::Hitpoints,
        Skill::Ranged,
        Skill::Prayer,
        Skill::Magic,
        Skill::Cooking,
        Skill::Woodcutting,
        Skill::Fletching,
        Skill::Fishing,
        Skill::Firemaking,
        Skill::Crafting,
        Skill::Smithing,
        Skill::Mining,
        Skill::Herblore,
        Skill::Agility,
        Skill::Thieving,
        Skill::Slayer,
        Skill::Farming,
        Skill::Runecraft,
        Skill::Hunter,
        Skill::Construction,
        Skill::Sailing,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Skill::Attack => "Attack",
            Skill::Defence => "Defence",
            Skill::Strength => "Strength",
            Skill::Hitpoints => "Hitpoints",
            Skill::Ranged => "Ranged",
            Skill::Prayer => "Prayer",
            Skill::Magic => "Magic",
            Skill::Cooking => "Cooking",
            Skill::Woodcutting => "Woodcutting",
            Skill::Fletching => "Fletching",
            Skill::Fishing => "Fishing",
            Skill::Firemaking => "Firemaking",
            Skill::Crafting => "Crafting",
            Skill::Smithing => "Smithing",
            Skill::Mining => "Mining",
            Skill::Herblore => "Herblore",
            Skill::Agility => "Agility",
            Skill::Thieving => "Thieving",
            Skill::Slayer => "Slayer",
            Skill::Farming => "Farming",
            Skill::Runecraft => "Runecraft",
            Skill::Hunter => "Hunter",
            Skill::Construction => "Construction",
            Skill::Sailing => "Sailing",
            Skill::Overall => "Overall",
        }
    }

    pub fn is_tracked(self) -> bool {
        self != Skill::Overall
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSkill(pub String);

impl fmt::Display for UnknownSkill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown skill '{}'", self.0)
    }
}

impl std::error::Error for UnknownSkill {}

impl FromStr for Skill {
    type Err = UnknownSkill;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Skill::TRACKED
            .iter()
            .copied()
            .chain(std::iter::once(Skill::Overall))
            .find(|skill| skill.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownSkill(trimmed.to_string()))
    }
}

impl Serialize for Skill {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Skill {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Skills the user asked not to track. Built once from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreSet {
    skills: HashSet<Skill>,
}

impl IgnoreSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unknown names are logged and skipped.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut skills = HashSet::new();
        for name in names {
            match name.parse::<Skill>() {
                Ok(skill) => {
                    skills.insert(skill);
                }
                Err(err) => log::warn!("Ignoring entry in ignore table: {err}"),
            }
        }
        Self { skills }
    }

    pub fn contains(&self, skill: Skill) -> bool {
        self.skills.contains(&skill)
    }

    /// `Overall` never qualifies regardless of configuration.
    pub fn admits(&self, skill: Skill) -> bool {
        skill.is_tracked() && !self.contains(skill)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}
