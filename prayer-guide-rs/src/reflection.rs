//! Per-category reflection drafts.

use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReflectionDraft {
    pub text: String,
    pub open: bool,
    pub locked: bool,
}

impl ReflectionDraft {
    /// Hidden opens for editing, open and locked unlocks, open and
    /// editable hides.
    pub fn toggle(&mut self) {
        if !self.open {
            self.open = true;
            self.locked = false;
        } else if self.locked {
            self.locked = false;
        } else {
            self.open = false;
        }
    }

    pub fn lock(&mut self) {
        if self.open {
            self.locked = true;
        }
    }

    /// Edits are ignored while locked. Returns whether the text changed.
    pub fn edit(&mut self, text: impl Into<String>) -> bool {
        if self.locked {
            return false;
        }
        self.text = text.into();
        true
    }

    /// Text to encrypt and save, if this draft qualifies.
    pub fn saveable(&self) -> Option<&str> {
        (self.open && self.locked && !self.text.trim().is_empty()).then_some(self.text.as_str())
    }
}

#[derive(Debug, Default)]
pub struct ReflectionBoard {
    drafts: HashMap<String, ReflectionDraft>,
}

impl ReflectionBoard {
    pub fn get(&self, category: &str) -> Option<&ReflectionDraft> {
        self.drafts.get(category)
    }

    pub fn draft_mut(&mut self, category: &str) -> &mut ReflectionDraft {
        self.drafts.entry(category.to_string()).or_default()
    }

    /// Hide, clear and unlock a category's reflection. Called whenever the
    /// displayed prompt of that category changes.
    pub fn clear(&mut self, category: &str) {
        self.drafts.remove(category);
    }

    pub fn clear_all(&mut self) {
        self.drafts.clear();
    }

    pub fn saveable(&self, category: &str) -> Option<&str> {
        self.drafts.get(category).and_then(ReflectionDraft::saveable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_cycles_through_states() {
        let mut draft = ReflectionDraft::default();
        draft.toggle();
        assert!(draft.open && !draft.locked);

        draft.lock();
        assert!(draft.locked);
        draft.toggle();
        assert!(draft.open && !draft.locked);

        draft.toggle();
        assert!(!draft.open);
    }

    #[test]
    fn lock_requires_an_open_draft_and_blocks_edits() {
        let mut draft = ReflectionDraft::default();
        draft.lock();
        assert!(!draft.locked);

        draft.toggle();
        assert!(draft.edit("first"));
        draft.lock();
        assert!(!draft.edit("second"));
        assert_eq!(draft.text, "first");
    }

    #[test]
    fn only_open_locked_non_blank_drafts_are_saveable() {
        let mut board = ReflectionBoard::default();
        let draft = board.draft_mut("Adoration");
        draft.toggle();
        draft.edit("  kept verbatim \n");
        assert!(board.saveable("Adoration").is_none());

        board.draft_mut("Adoration").lock();
        assert_eq!(board.saveable("Adoration"), Some("  kept verbatim \n"));

        board.draft_mut("Adoration").toggle();
        board.draft_mut("Adoration").toggle();
        assert!(board.saveable("Adoration").is_none());

        let blank = board.draft_mut("Petition");
        blank.toggle();
        blank.edit("   ");
        blank.lock();
        assert!(board.saveable("Petition").is_none());
    }

    #[test]
    fn clear_resets_the_draft() {
        let mut board = ReflectionBoard::default();
        let draft = board.draft_mut("Confession");
        draft.toggle();
        draft.edit("words");
        draft.lock();

        board.clear("Confession");
        assert!(board.get("Confession").is_none());
        assert_eq!(board.draft_mut("Confession"), &ReflectionDraft::default());
    }
}
