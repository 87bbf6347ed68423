//! Built-in demonstration catalog.
//!
//! Three collectors describe where a file comes from:
//!
//! - `resource`: what the file holds (analysis, gridpoint output, climatology).
//! - `provider`: who produced it (experiment, operational suite, remote host).
//! - `store`: where it lives (local file, archive, cache).
//!
//! The binary resolves command line descriptions against this catalog. Every
//! candidate goes through the regular declaration path, so the catalog also
//! serves as a worked example of inheritance, aliases, remaps, typed
//! attributes, placeholders and `only` rules.

mod providers;
mod resources;
mod stores;

#[cfg(test)]
mod tests;

use crate::{Registry, Result};

/// Collector tags of the catalog.
pub const TAGS: [&str; 3] = ["resource", "provider", "store"];

/// A registry holding every catalog candidate.
pub fn registry() -> Result<Registry> {
    let mut registry = Registry::new();
    let groups = [resources::candidates()?, providers::candidates()?, stores::candidates()?];
    for candidate in groups.iter().flatten() {
        registry.register(candidate);
    }
    tracing::debug!(tags = ?registry.tags().collect::<Vec<_>>(), "catalog loaded");
    Ok(registry)
}
