//! Per-record visibility.
//!
//! Visibility is the conjunction of independent axes, each a plain function
//! of the filter, the record and the registries. Axes are evaluated fresh on
//! every row rebuild; nothing is cached between rebuilds.

use crate::model::record::{LevelMask, Record};
use crate::model::registry::Registries;

use super::matcher::StringMatcher;

type Axis = fn(&VisibilityFilter, &Record, &Registries) -> bool;

const AXES: [Axis; 6] = [
    not_collapsed,
    level_enabled,
    thread_visible,
    thread_name_visible,
    logger_visible,
    text_matches,
];

/// Level mask plus optional text matcher. Thread, thread-name and logger
/// visibility live in the store's registries.
#[derive(Debug, Clone)]
pub struct VisibilityFilter {
    levels: LevelMask,
    text: Option<StringMatcher>,
}

impl Default for VisibilityFilter {
    fn default() -> Self {
        Self {
            levels: LevelMask::ALL,
            text: None,
        }
    }
}

impl VisibilityFilter {
    pub fn new(levels: LevelMask) -> Self {
        Self { levels, text: None }
    }

    pub fn levels(&self) -> LevelMask {
        self.levels
    }

    /// Returns true if the mask changed.
    pub fn set_levels(&mut self, levels: LevelMask) -> bool {
        let changed = self.levels != levels;
        self.levels = levels;
        changed
    }

    pub fn text(&self) -> Option<&StringMatcher> {
        self.text.as_ref()
    }

    pub fn set_text(&mut self, matcher: Option<StringMatcher>) {
        self.text = matcher;
    }

    pub fn is_visible(&self, record: &Record, registries: &Registries) -> bool {
        AXES.iter().all(|axis| axis(self, record, registries))
    }
}

fn not_collapsed(_: &VisibilityFilter, record: &Record, _: &Registries) -> bool {
    record.is_eligible_for_display()
}

fn level_enabled(filter: &VisibilityFilter, record: &Record, _: &Registries) -> bool {
    filter.levels.contains(record.level())
}

fn thread_visible(_: &VisibilityFilter, record: &Record, registries: &Registries) -> bool {
    registries.threads.is_visible(record.thread())
}

fn thread_name_visible(_: &VisibilityFilter, record: &Record, registries: &Registries) -> bool {
    registries.thread_names.is_visible(record.thread_name())
}

fn logger_visible(_: &VisibilityFilter, record: &Record, registries: &Registries) -> bool {
    registries.loggers.is_visible(record.logger())
}

/// Multi-line records match against their joined text.
fn text_matches(filter: &VisibilityFilter, record: &Record, _: &Registries) -> bool {
    let Some(matcher) = &filter.text else {
        return true;
    };
    match record.lines() {
        [line] => matcher.matches(line),
        _ => matcher.matches(&record.text()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::TraceScript;
    use crate::model::record::TraceLevel;
    use crate::view_state::matcher::MatchMode;

    fn store() -> crate::model::store::RecordStore {
        let mut script = TraceScript::new();
        script
            .message("plain")
            .level(TraceLevel::Warn)
            .message("warned")
            .level(TraceLevel::Info)
            .thread(2, "Worker")
            .logger("Net")
            .message("first\nsecond");
        script.build_store()
    }

    fn visible(filter: &VisibilityFilter, store: &crate::model::store::RecordStore) -> Vec<bool> {
        store
            .iter()
            .map(|r| filter.is_visible(r, store.registries()))
            .collect()
    }

    #[test]
    fn default_filter_shows_everything() {
        let store = store();
        assert_eq!(
            visible(&VisibilityFilter::default(), &store),
            vec![true, true, true]
        );
    }

    #[test]
    fn level_axis_hides_unset_bits() {
        let store = store();
        let mut filter = VisibilityFilter::default();
        let mut levels = LevelMask::ALL;
        levels.remove(TraceLevel::Warn);
        assert!(filter.set_levels(levels));
        assert!(!filter.set_levels(levels));
        assert_eq!(visible(&filter, &store), vec![true, false, true]);
    }

    #[test]
    fn registry_axes_are_independent() {
        let mut store = store();
        let net = store.registries().loggers.find(&"Net".to_string()).unwrap();
        store.registries_mut().loggers.set_visible(net, false);
        let filter = VisibilityFilter::default();
        assert_eq!(visible(&filter, &store), vec![true, true, false]);

        store.registries_mut().loggers.show_all();
        let main = store.registries().thread_names.find(&"Main".to_string()).unwrap();
        store.registries_mut().thread_names.set_visible(main, false);
        assert_eq!(visible(&filter, &store), vec![false, false, true]);
    }

    #[test]
    fn text_axis_matches_joined_lines() {
        let store = store();
        let mut filter = VisibilityFilter::default();
        filter.set_text(Some(StringMatcher::new("SECOND", MatchMode::Substring).unwrap()));
        assert_eq!(visible(&filter, &store), vec![false, false, true]);

        filter.set_text(Some(
            StringMatcher::new(r"first\nsecond", MatchMode::Regex).unwrap(),
        ));
        assert_eq!(visible(&filter, &store), vec![false, false, true]);
    }

    #[test]
    fn collapsed_records_are_never_visible() {
        let mut script = TraceScript::new();
        script.enter("A").message("body").exit();
        let mut store = script.build_store();
        store.expand_collapse_method(0);
        assert_eq!(
            visible(&VisibilityFilter::default(), &store),
            vec![true, false, true]
        );
    }
}
