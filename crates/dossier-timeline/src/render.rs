//! Timeline rendering with actor display names.

use std::collections::HashMap;

use dossier_types::ActorDirectory;
use serde::{Deserialize, Serialize};

use crate::event::TimelineEntry;

/// A timeline entry paired with the display name of its actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineItem {
    #[serde(flatten)]
    pub entry: TimelineEntry,
    /// `None` for system entries and actors the directory cannot resolve.
    pub actor_name: Option<String>,
}

/// Attaches actor names to `entries`, keeping their order.
///
/// Each distinct actor is looked up once.
pub fn render_timeline(
    entries: Vec<TimelineEntry>,
    directory: &dyn ActorDirectory,
) -> Vec<TimelineItem> {
    let mut names: HashMap<String, Option<String>> = HashMap::new();

    entries
        .into_iter()
        .map(|entry| {
            let actor_name = entry.actor_id.as_ref().and_then(|actor_id| {
                names
                    .entry(actor_id.clone())
                    .or_insert_with(|| {
                        let name = directory.display_name(actor_id);
                        if name.is_none() {
                            tracing::debug!(actor_id = %actor_id, "no display name for actor");
                        }
                        name
                    })
                    .clone()
            });
            TimelineItem { entry, actor_name }
        })
        .collect()
}
