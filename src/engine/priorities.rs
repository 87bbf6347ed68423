//! Ordered priority levels used to rank competing candidates.
//!
//! Levels are plain tags, compared case-insensitively and stored upper-case.
//! Their rank is their position in the set, so re-ordering the set re-ranks
//! every footprint declaring one of them without touching the footprints.

use crate::{FootprintError, Result};
use indexmap::IndexMap;
use once_cell::sync::Lazy;

/// The standard set: `NONE < DEFAULT < TOOLBOX < OLIVE < OPER < DEBUG`.
pub static STANDARD: Lazy<PrioritySet> =
    Lazy::new(|| PrioritySet::new(["none", "default", "toolbox", "olive", "oper", "debug"]));

/// Where [`PrioritySet::insert`] places a new level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    Before(String),
    After(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrioritySet {
    levels: Vec<String>,
    frozen: IndexMap<String, Vec<String>>,
}

impl Default for PrioritySet {
    fn default() -> Self {
        STANDARD.clone()
    }
}

impl PrioritySet {
    /// Build a set from `levels` (lowest first) and freeze it as `default`.
    pub fn new<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = PrioritySet { levels: Vec::new(), frozen: IndexMap::new() };
        set.extend(levels);
        set.frozen.insert("default".to_string(), set.levels.clone());
        set
    }

    pub fn levels(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.position(tag).is_some()
    }

    fn position(&self, tag: &str) -> Option<usize> {
        let tag = tag.to_uppercase();
        self.levels.iter().position(|l| *l == tag)
    }

    fn require(&self, tag: &str) -> Result<usize> {
        self.position(tag).ok_or_else(|| FootprintError::UnknownPriority(tag.to_uppercase()))
    }

    // --- Ranking -----------------------------------------------------------------

    /// Rank of `tag`: zero for the lowest level.
    pub fn rank(&self, tag: &str) -> Result<usize> {
        self.require(tag)
    }

    pub fn level_by_rank(&self, rank: usize) -> Option<&str> {
        self.levels.get(rank).map(String::as_str)
    }

    /// Level immediately above `tag`.
    pub fn next(&self, tag: &str) -> Option<&str> {
        self.position(tag).and_then(|idx| self.level_by_rank(idx + 1))
    }

    /// Level immediately below `tag`.
    pub fn prev(&self, tag: &str) -> Option<&str> {
        self.position(tag).and_then(|idx| idx.checked_sub(1)).and_then(|idx| self.level_by_rank(idx))
    }

    // --- Editing -----------------------------------------------------------------

    /// Append `levels` at the top. Levels already present move to the top too.
    pub fn extend<I, S>(&mut self, levels: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for level in levels {
            let level = level.as_ref().to_uppercase();
            self.levels.retain(|l| *l != level);
            self.levels.push(level);
        }
    }

    /// Insert `tag` next to an existing level.
    pub fn insert(&mut self, tag: &str, at: Position) -> Result<()> {
        let tag = tag.to_uppercase();
        let (anchor, offset) = match &at {
            Position::Before(anchor) => (anchor, 0),
            Position::After(anchor) => (anchor, 1),
        };
        self.require(anchor)?;
        self.levels.retain(|l| *l != tag);
        let idx = self.require(anchor)? + offset;
        self.levels.insert(idx, tag);
        Ok(())
    }

    /// Returns whether `tag` was present.
    pub fn remove(&mut self, tag: &str) -> bool {
        match self.position(tag) {
            Some(idx) => {
                self.levels.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Move `tag` by `shift` positions (positive is higher), clamped to the set.
    pub fn rerank(&mut self, tag: &str, shift: isize) -> Result<()> {
        let idx = self.require(tag)?;
        let target = idx.saturating_add_signed(shift);
        let level = self.levels.remove(idx);
        let target = target.min(self.levels.len());
        self.levels.insert(target, level);
        Ok(())
    }

    pub fn up(&mut self, tag: &str) -> Result<()> {
        self.rerank(tag, 1)
    }

    pub fn down(&mut self, tag: &str) -> Result<()> {
        self.rerank(tag, -1)
    }

    pub fn top(&mut self, tag: &str) -> Result<()> {
        self.rerank(tag, self.levels.len() as isize)
    }

    pub fn bottom(&mut self, tag: &str) -> Result<()> {
        self.rerank(tag, -(self.levels.len() as isize))
    }

    // --- Snapshots ---------------------------------------------------------------

    /// Store the current ordering under `tag`. The `default` snapshot is fixed.
    pub fn freeze(&mut self, tag: &str) -> Result<()> {
        let tag = tag.to_lowercase();
        if tag == "default" {
            return Err(FootprintError::FrozenDefault);
        }
        self.frozen.insert(tag, self.levels.clone());
        Ok(())
    }

    pub fn restore(&mut self, tag: &str) -> Result<()> {
        let levels = self.frozen.get(&tag.to_lowercase()).ok_or_else(|| FootprintError::UnknownFreeze(tag.to_string()))?;
        self.levels.clone_from(levels);
        Ok(())
    }

    /// Back to the ordering the set was created with.
    pub fn reset(&mut self) {
        if let Some(levels) = self.frozen.get("default") {
            self.levels.clone_from(levels);
        }
    }

    pub fn frozen(&self) -> Vec<&str> {
        self.frozen.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ordered(set: &PrioritySet) -> Vec<&str> {
        set.levels().collect()
    }

    #[test]
    fn standard_ordering() {
        let set = PrioritySet::default();
        assert_eq!(ordered(&set), vec!["NONE", "DEFAULT", "TOOLBOX", "OLIVE", "OPER", "DEBUG"]);
        assert_eq!(set.rank("default").unwrap(), 1);
        assert!(set.rank("debug").unwrap() > set.rank("oper").unwrap());
        assert_eq!(set.next("olive"), Some("OPER"));
        assert_eq!(set.prev("none"), None);
        assert!(matches!(set.rank("nope"), Err(FootprintError::UnknownPriority(_))));
    }

    #[test]
    fn extend_moves_existing_levels_on_top() {
        let mut set = PrioritySet::new(["low", "mid"]);
        set.extend(["high", "low"]);
        assert_eq!(ordered(&set), vec!["MID", "HIGH", "LOW"]);
    }

    #[test]
    fn insert_relative_to_anchor() {
        let mut set = PrioritySet::new(["low", "high"]);
        set.insert("mid", Position::After("low".into())).unwrap();
        set.insert("lowest", Position::Before("low".into())).unwrap();
        assert_eq!(ordered(&set), vec!["LOWEST", "LOW", "MID", "HIGH"]);
        assert!(set.insert("x", Position::After("nope".into())).is_err());
    }

    #[test]
    fn rerank_is_clamped() {
        let mut set = PrioritySet::new(["a", "b", "c", "d"]);
        set.rerank("b", 10).unwrap();
        assert_eq!(ordered(&set), vec!["A", "C", "D", "B"]);
        set.rerank("d", -10).unwrap();
        assert_eq!(ordered(&set), vec!["D", "A", "C", "B"]);
        set.up("a").unwrap();
        assert_eq!(ordered(&set), vec!["D", "C", "A", "B"]);
        set.top("d").unwrap();
        set.bottom("b").unwrap();
        assert_eq!(ordered(&set), vec!["B", "C", "A", "D"]);
    }

    #[test]
    fn freeze_and_restore() {
        let mut set = PrioritySet::default();
        set.freeze("before").unwrap();
        set.top("none").unwrap();
        assert_eq!(set.level_by_rank(5), Some("NONE"));

        set.restore("before").unwrap();
        assert_eq!(set.level_by_rank(0), Some("NONE"));

        set.remove("olive");
        set.reset();
        assert!(set.contains("olive"));

        assert!(matches!(set.freeze("Default"), Err(FootprintError::FrozenDefault)));
        assert!(matches!(set.restore("never"), Err(FootprintError::UnknownFreeze(_))));
        assert_eq!(set.frozen(), vec!["default", "before"]);
    }
}
