//! Random prompt selection with a short per-category back history.

use std::collections::{HashMap, VecDeque};

use rand::seq::SliceRandom;

use crate::prompts::{missing_prompt_text, CategoryPool, Prompt};

pub const HISTORY_LEN: usize = 3;

#[derive(Debug, Default)]
pub struct PromptSelector {
    pool: CategoryPool,
    /// Most recent first.
    history: HashMap<String, VecDeque<Prompt>>,
    displayed: HashMap<String, Option<Prompt>>,
}

impl PromptSelector {
    pub fn new(pool: CategoryPool) -> Self {
        Self {
            pool,
            ..Self::default()
        }
    }

    /// Swap in a new pool. History and displayed prompts are cleared and
    /// every active category starts out with nothing displayed.
    pub fn reset(&mut self, pool: CategoryPool, active: &[String]) {
        self.pool = pool;
        self.history.clear();
        self.displayed = active.iter().map(|c| (c.clone(), None)).collect();
    }

    pub fn pool(&self) -> &CategoryPool {
        &self.pool
    }

    pub fn select_random(&self, category: &str) -> Option<Prompt> {
        self.pool
            .prompts(category)
            .choose(&mut rand::thread_rng())
            .cloned()
    }

    pub fn record_history(&mut self, category: &str, prompt: Prompt) {
        let entries = self.history.entry(category.to_string()).or_default();
        entries.push_front(prompt);
        entries.truncate(HISTORY_LEN);
    }

    /// Pop the most recent history entry for `category`.
    pub fn go_back(&mut self, category: &str) -> Option<Prompt> {
        self.history.get_mut(category)?.pop_front()
    }

    pub fn can_go_back(&self, category: &str) -> bool {
        self.history.get(category).is_some_and(|h| !h.is_empty())
    }

    pub fn history(&self, category: &str) -> Vec<Prompt> {
        self.history
            .get(category)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Replace the displayed prompt of one category with a fresh random
    /// pick, pushing the current one to history first.
    pub fn refresh(&mut self, category: &str) -> Option<&Prompt> {
        if let Some(Some(current)) = self.displayed.remove(category) {
            self.record_history(category, current);
        }
        let next = self.select_random(category);
        self.displayed.insert(category.to_string(), next);
        self.displayed(category)
    }

    /// Refresh every active category, in order.
    pub fn regenerate(&mut self, active: &[String]) {
        for category in active {
            self.refresh(category);
        }
    }

    /// Restore the previous prompt. The discarded current prompt is not
    /// kept anywhere. Returns false when there is no history.
    pub fn back(&mut self, category: &str) -> bool {
        match self.go_back(category) {
            Some(previous) => {
                self.displayed.insert(category.to_string(), Some(previous));
                true
            }
            None => false,
        }
    }

    pub fn displayed(&self, category: &str) -> Option<&Prompt> {
        self.displayed.get(category).and_then(Option::as_ref)
    }

    pub fn displayed_prompts(&self) -> &HashMap<String, Option<Prompt>> {
        &self.displayed
    }

    /// Display text for a category, including the placeholder when no
    /// prompt is available.
    pub fn rendered(&self, category: &str) -> String {
        match self.displayed(category) {
            Some(prompt) => prompt.render(),
            None => missing_prompt_text(category),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(category: &str, text: &str) -> Prompt {
        Prompt {
            category: category.into(),
            text: text.into(),
            scripture_references: Vec::new(),
        }
    }

    fn pool(category: &str, count: usize) -> CategoryPool {
        CategoryPool::from_prompts(
            (0..count)
                .map(|i| prompt(category, &format!("{category} {i}")))
                .collect(),
        )
    }

    #[test]
    fn go_back_pops_most_recent_first_up_to_three() {
        let mut selector = PromptSelector::default();
        for i in 0..5 {
            selector.record_history("Adoration", prompt("Adoration", &i.to_string()));
        }
        assert_eq!(selector.history("Adoration").len(), HISTORY_LEN);

        let popped: Vec<String> = std::iter::from_fn(|| selector.go_back("Adoration"))
            .map(|p| p.text)
            .collect();
        assert_eq!(popped, ["4", "3", "2"]);
        assert!(selector.go_back("Adoration").is_none());
    }

    #[test]
    fn short_history_returns_everything_then_nothing() {
        let mut selector = PromptSelector::default();
        selector.record_history("Petition", prompt("Petition", "a"));
        selector.record_history("Petition", prompt("Petition", "b"));
        assert_eq!(selector.go_back("Petition").unwrap().text, "b");
        assert_eq!(selector.go_back("Petition").unwrap().text, "a");
        assert!(selector.go_back("Petition").is_none());
        assert!(selector.go_back("Unknown").is_none());
    }

    #[test]
    fn select_random_draws_from_the_category() {
        let selector = PromptSelector::new(pool("Confession", 4));
        for _ in 0..20 {
            let picked = selector.select_random("Confession").unwrap();
            assert!(picked.text.starts_with("Confession "));
        }
        assert!(selector.select_random("Adoration").is_none());
    }

    #[test]
    fn refresh_pushes_current_prompt_before_selecting() {
        let active = vec!["Confession".to_string()];
        let mut selector = PromptSelector::default();
        selector.reset(pool("Confession", 3), &active);

        selector.refresh("Confession");
        assert!(!selector.can_go_back("Confession"));
        let first = selector.displayed("Confession").cloned().unwrap();

        selector.refresh("Confession");
        assert_eq!(selector.history("Confession"), vec![first.clone()]);

        assert!(selector.back("Confession"));
        assert_eq!(selector.displayed("Confession"), Some(&first));
        assert!(!selector.can_go_back("Confession"));
    }

    #[test]
    fn history_stays_bounded_under_repeated_regeneration() {
        let active = vec!["Adoration".to_string(), "Petition".to_string()];
        let mut selector = PromptSelector::default();
        let mut prompts: Vec<Prompt> = (0..5).map(|i| prompt("Adoration", &i.to_string())).collect();
        prompts.push(prompt("Petition", "only"));
        selector.reset(CategoryPool::from_prompts(prompts), &active);

        for _ in 0..10 {
            selector.regenerate(&active);
            assert!(selector.history("Adoration").len() <= HISTORY_LEN);
            assert!(selector.history("Petition").len() <= HISTORY_LEN);
        }
        assert_eq!(selector.history("Petition").len(), HISTORY_LEN);
    }

    #[test]
    fn empty_category_renders_placeholder_and_records_nothing() {
        let active = vec!["Intercession".to_string()];
        let mut selector = PromptSelector::default();
        selector.reset(pool("Adoration", 2), &active);

        selector.regenerate(&active);
        selector.regenerate(&active);
        assert!(selector.displayed("Intercession").is_none());
        assert!(!selector.can_go_back("Intercession"));
        assert_eq!(
            selector.rendered("Intercession"),
            "(No prompt available for Intercession)"
        );
    }

    #[test]
    fn reset_clears_history_and_display() {
        let active = vec!["Adoration".to_string()];
        let mut selector = PromptSelector::default();
        selector.reset(pool("Adoration", 2), &active);
        selector.regenerate(&active);
        selector.regenerate(&active);

        selector.reset(pool("Adoration", 2), &active);
        assert!(selector.displayed("Adoration").is_none());
        assert!(!selector.can_go_back("Adoration"));
        assert!(selector.displayed_prompts().contains_key("Adoration"));
    }
}
