use super::manipulation::handle_params_for;
use super::{SceneEvent, SceneProject};
use crate::render::{RenderSurface, SelectionStyle};
use crate::scene::MeshId;
use std::collections::BTreeSet;

/// Selection state. `Multi` always holds two or more members, one of them
/// the primary (the most recently added).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    None,
    Single(MeshId),
    Multi {
        primary: MeshId,
        members: BTreeSet<MeshId>,
    },
}

impl Selection {
    pub fn primary(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Single(id) => Some(id),
            Self::Multi { primary, .. } => Some(primary),
        }
    }

    /// The id that carries the manipulation handle.
    pub fn single(&self) -> Option<&str> {
        match self {
            Self::Single(id) => Some(id),
            _ => None,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        match self {
            Self::None => false,
            Self::Single(selected) => selected == id,
            Self::Multi { members, .. } => members.contains(id),
        }
    }

    pub fn members(&self) -> Vec<MeshId> {
        match self {
            Self::None => Vec::new(),
            Self::Single(id) => vec![id.clone()],
            Self::Multi { members, .. } => members.iter().cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Transition for a pick result. A plain pick replaces the selection; a
    /// modifier pick toggles membership and keeps the selection on a miss.
    pub fn picked(&self, hit: Option<MeshId>, toggle: bool) -> Self {
        match (hit, toggle) {
            (None, false) => Self::None,
            (None, true) => self.clone(),
            (Some(id), false) => Self::Single(id),
            (Some(id), true) if self.contains(&id) => self.without(&id),
            (Some(id), true) => {
                let mut members: BTreeSet<MeshId> = self.members().into_iter().collect();
                members.insert(id.clone());
                Self::collapse(Some(id), members)
            }
        }
    }

    pub fn without(&self, id: &str) -> Self {
        if !self.contains(id) {
            return self.clone();
        }
        let mut members: BTreeSet<MeshId> = self.members().into_iter().collect();
        members.remove(id);
        let primary = self
            .primary()
            .filter(|primary| *primary != id)
            .map(str::to_string);
        Self::collapse(primary, members)
    }

    fn collapse(primary: Option<MeshId>, members: BTreeSet<MeshId>) -> Self {
        match members.len() {
            0 => Self::None,
            1 => members
                .into_iter()
                .next()
                .map_or(Self::None, Self::Single),
            _ => {
                let primary = primary
                    .filter(|primary| members.contains(primary))
                    .or_else(|| members.iter().next().cloned());
                match primary {
                    Some(primary) => Self::Multi { primary, members },
                    None => Self::None,
                }
            }
        }
    }
}

impl<S: RenderSurface> SceneProject<S> {
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selection.primary()
    }

    /// Pick at viewport coordinates and update the selection. Returns the
    /// entity hit, if any.
    pub fn select_at(&mut self, x: f32, y: f32, toggle: bool) -> Option<MeshId> {
        let hit = self.runtime.as_ref().and_then(|runtime| {
            runtime
                .surface()
                .pick(x, y)
                .and_then(|proxy| runtime.id_of(proxy).cloned())
        });
        let next = self.selection.picked(hit.clone(), toggle);
        self.apply_selection(next);
        hit
    }

    /// Force a single selection (or none). Ids not in the store are refused.
    pub fn highlight(&mut self, id: Option<&str>) -> bool {
        match id {
            Some(id) if !self.store.contains(id) => {
                log::debug!("Scene '{}': cannot highlight unknown '{}'", self.id, id);
                false
            }
            Some(id) => {
                self.apply_selection(Selection::Single(id.to_string()));
                true
            }
            None => {
                self.apply_selection(Selection::None);
                true
            }
        }
    }

    pub fn clear_selection(&mut self) {
        self.apply_selection(Selection::None);
    }

    pub(super) fn forget_selected(&mut self, id: &str) {
        let next = self.selection.without(id);
        self.apply_selection(next);
    }

    fn apply_selection(&mut self, next: Selection) {
        if next == self.selection {
            return;
        }
        if self.drag.target() != next.single() {
            self.end_drag();
        }
        let previous = std::mem::replace(&mut self.selection, next);
        if let Some(runtime) = self.runtime.as_mut() {
            for id in previous.members() {
                if self.selection.contains(&id) {
                    continue;
                }
                if let Some(proxy) = runtime.proxy(&id) {
                    let _ = runtime.surface_mut().set_selection_style(proxy, None);
                }
            }
        }
        self.refresh_selection_visuals();
        if previous.primary() != self.selection.primary() {
            let primary = self.selection.primary().map(str::to_string);
            self.emit(SceneEvent::SelectionChanged(primary));
        }
    }

    /// Re-apply outline and handle for the current selection, e.g. after
    /// attach or a proxy rebuild.
    pub(super) fn refresh_selection_visuals(&mut self) {
        let Some(runtime) = self.runtime.as_mut() else {
            self.drag.reset();
            return;
        };
        for id in self.selection.members() {
            if let Some(proxy) = runtime.proxy(&id) {
                if let Err(err) = runtime
                    .surface_mut()
                    .set_selection_style(proxy, Some(SelectionStyle::OUTLINE))
                {
                    log::debug!("Failed to outline '{}': {}", id, err);
                }
            }
        }
        let target = self
            .selection
            .single()
            .and_then(|id| runtime.proxy(id).map(|proxy| (id, proxy)));
        match target {
            Some((id, proxy)) => {
                let params = handle_params_for(&self.config, runtime.surface(), self.store.get(id));
                runtime.surface_mut().attach_handle(proxy, params);
                self.drag.seed(id, runtime.live_transform(id));
            }
            None => {
                runtime.surface_mut().detach_handle();
                self.drag.reset();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Selection;

    fn id(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn plain_pick_replaces_or_clears() {
        let selection = Selection::None.picked(id("a"), false);
        assert_eq!(selection, Selection::Single("a".to_string()));
        assert_eq!(selection.picked(id("b"), false), Selection::Single("b".to_string()));
        assert_eq!(selection.picked(None, false), Selection::None);
    }

    #[test]
    fn toggle_pick_grows_and_shrinks() {
        let selection = Selection::None
            .picked(id("a"), true)
            .picked(id("b"), true);
        match &selection {
            Selection::Multi { primary, members } => {
                assert_eq!(primary, "b");
                assert_eq!(members.len(), 2);
            }
            other => panic!("Expected multi selection, got {:?}", other),
        }
        let shrunk = selection.picked(id("b"), true);
        assert_eq!(shrunk, Selection::Single("a".to_string()));
        assert_eq!(shrunk.picked(id("a"), true), Selection::None);
    }

    #[test]
    fn toggle_miss_keeps_selection() {
        let selection = Selection::Single("a".to_string());
        assert_eq!(selection.picked(None, true), selection);
    }

    #[test]
    fn removing_primary_promotes_another_member() {
        let selection = Selection::None
            .picked(id("a"), true)
            .picked(id("b"), true)
            .picked(id("c"), true);
        let next = selection.without("c");
        assert!(matches!(&next, Selection::Multi { primary, .. } if primary != "c"));
        assert!(!next.contains("c"));
        assert_eq!(Selection::Single("x".to_string()).without("x"), Selection::None);
        assert_eq!(Selection::Single("x".to_string()).without("y"), Selection::Single("x".to_string()));
    }
}
