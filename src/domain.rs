//! Domain models: the workbook, its problems, and the two difficulty-level schemes.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const MIN_NUMERIC_LEVEL: u8 = 1;
pub const MAX_NUMERIC_LEVEL: u8 = 5;

/// Named difficulty tiers used by the tiered scheme, ordered easiest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
  Beginner,
  Intermediate,
  Expert,
}

impl Tier {
  pub const ALL: [Tier; 3] = [Tier::Beginner, Tier::Intermediate, Tier::Expert];

  pub fn as_str(self) -> &'static str {
    match self {
      Tier::Beginner => "Beginner",
      Tier::Intermediate => "Intermediate",
      Tier::Expert => "Expert",
    }
  }
}

/// Difficulty of a single problem. On the wire this is either a bare integer
/// (`3`) or a tier name (`"Expert"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Level {
  Numeric(u8),
  Tier(Tier),
}

impl Level {
  /// Sort key; lower is easier.
  pub fn rank(self) -> u8 {
    match self {
      Level::Numeric(n) => n,
      Level::Tier(t) => t as u8 + 1,
    }
  }
}

impl fmt::Display for Level {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Level::Numeric(n) => write!(f, "{}", n),
      Level::Tier(t) => f.write_str(t.as_str()),
    }
  }
}

/// Which level representation a workbook is requested (and validated) in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelScheme {
  /// Integer levels 1..=5 with title, description and hint per problem.
  #[default]
  Numeric,
  /// Beginner / Intermediate / Expert with question and solution only.
  Tiered,
}

impl LevelScheme {
  pub fn default_problem_count(self) -> usize {
    match self {
      LevelScheme::Numeric => (MAX_NUMERIC_LEVEL - MIN_NUMERIC_LEVEL + 1) as usize,
      LevelScheme::Tiered => Tier::ALL.len(),
    }
  }

  /// Human-readable description of the expected level, used in error messages.
  pub fn expected(self) -> &'static str {
    match self {
      LevelScheme::Numeric => "numeric (1-5)",
      LevelScheme::Tiered => "Beginner/Intermediate/Expert",
    }
  }

  pub fn accepts(self, level: Level) -> bool {
    match (self, level) {
      (LevelScheme::Numeric, Level::Numeric(n)) => (MIN_NUMERIC_LEVEL..=MAX_NUMERIC_LEVEL).contains(&n),
      (LevelScheme::Tiered, Level::Tier(_)) => true,
      _ => false,
    }
  }
}

/// One question/solution/hint unit at a specific difficulty level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Problem {
  pub level: Level,
  #[serde(default)] pub title: String,
  #[serde(default)] pub description: String,
  pub question: String,
  pub solution: String,
  #[serde(default)] pub hint: String,
}

/// A named collection of leveled practice problems, easiest first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
  pub topic: String,
  pub problems: Vec<Problem>,
}
