//! Filesystem event handler for the notify watcher (hot-reload).

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind};
use tracing::{info, warn};

use crate::registry::RuleRegistry;

use super::core::{is_dotfile, is_yaml};

/// Whether an event should trigger a reload.
pub(super) fn is_relevant(event: &Event) -> bool {
    let kind_matches = matches!(
        event.kind,
        EventKind::Create(CreateKind::File)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Remove(RemoveKind::File)
    );
    kind_matches && event.paths.iter().any(|p| is_yaml(p) && !is_dotfile(p))
}

/// Handle a single filesystem event: any YAML change reloads the whole set.
pub(super) fn handle_fs_event(event: &Event, registry: &RuleRegistry) {
    if !is_relevant(event) {
        return;
    }
    match registry.reload() {
        Ok(count) => info!(count, paths = ?event.paths, "hot-reloaded rules"),
        Err(e) => warn!(error = %e, "hot-reload failed, keeping previous rule set"),
    }
}
