use std::collections::HashSet;

use super::{OptionValue, OptionsObject, WEB_CONTENTS, WEB_PREFERENCES};

/// Internal view-type marker; never inherited.
pub const VIEW_MARKER_KEY: &str = "isBrowserView";

/// Keys that describe one particular window and never pass to a child.
const NEVER_INHERITED: &[&str] = &[VIEW_MARKER_KEY, WEB_CONTENTS];

/// Copy every entry of `parent` that `child` lacks into `child`.
///
/// Nested objects are copied recursively into fresh objects, so the child
/// never aliases the parent's nodes. `webPreferences` is the one key merged
/// into even when the child already has it: the child's own preference keys
/// win, missing ones are filled in from the parent.
///
/// The walk keeps the set of parent objects it is currently inside of. A
/// nested object that refers back to one of them is skipped, which makes the
/// merge terminate on self-referential trees.
pub fn merge_options(child: &OptionsObject, parent: &OptionsObject) {
    let mut visited = HashSet::new();
    merge_into(child, parent, &mut visited);
}

fn merge_into(child: &OptionsObject, parent: &OptionsObject, visited: &mut HashSet<usize>) {
    if !visited.insert(parent.addr()) {
        return;
    }

    for (key, value) in parent.entries() {
        if NEVER_INHERITED.contains(&key.as_str()) {
            continue;
        }
        let present = child.contains_key(&key);
        if present && key != WEB_PREFERENCES {
            continue;
        }

        match value {
            OptionValue::Object(nested) => {
                if visited.contains(&nested.addr()) {
                    continue;
                }
                let target = child.get_object(&key).unwrap_or_default();
                merge_into(&target, &nested, visited);
                child.insert(key, target);
            }
            other if !present => child.insert(key, other),
            _ => {}
        }
    }

    visited.remove(&parent.addr());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> OptionsObject {
        OptionsObject::from_json(&value)
    }

    #[test]
    fn child_keys_win_over_parent() {
        let child = tree(json!({"width": 300}));
        let parent = tree(json!({"width": 800, "height": 600}));
        merge_options(&child, &parent);
        assert_eq!(child.to_json(), json!({"width": 300, "height": 600}));
    }

    #[test]
    fn nested_objects_are_deep_copied() {
        let child = OptionsObject::new();
        let parent = tree(json!({"titleBar": {"style": "hidden"}}));
        merge_options(&child, &parent);

        let copied = child.get_object("titleBar").unwrap();
        assert!(!copied.ptr_eq(&parent.get_object("titleBar").unwrap()));
        copied.insert("style", "default");
        assert_eq!(
            parent.to_json(),
            json!({"titleBar": {"style": "hidden"}})
        );
    }

    #[test]
    fn existing_non_preference_objects_are_not_merged_into() {
        let child = tree(json!({"titleBar": {}}));
        let parent = tree(json!({"titleBar": {"style": "hidden"}}));
        merge_options(&child, &parent);
        assert_eq!(child.to_json(), json!({"titleBar": {}}));
    }

    #[test]
    fn web_preferences_merge_key_by_key() {
        let child = tree(json!({"webPreferences": {"sandbox": false}}));
        let parent = tree(json!({"webPreferences": {"sandbox": true, "zoomFactor": 2}}));
        merge_options(&child, &parent);
        assert_eq!(
            child.to_json(),
            json!({"webPreferences": {"sandbox": false, "zoomFactor": 2}})
        );
    }

    #[test]
    fn view_marker_is_never_inherited() {
        let child = OptionsObject::new();
        let parent = tree(json!({"isBrowserView": true, "show": true}));
        merge_options(&child, &parent);
        assert_eq!(child.to_json(), json!({"show": true}));
    }

    #[test]
    fn contents_handle_is_never_inherited() {
        let child = OptionsObject::new();
        let parent = tree(json!({"show": false}));
        parent.insert(WEB_CONTENTS, conduit_common::ContentsId(7));
        merge_options(&child, &parent);
        assert!(!child.contains_key(WEB_CONTENTS));
        assert_eq!(child.get_bool("show"), Some(false));
    }

    #[test]
    fn mutually_referencing_parents_terminate() {
        let a = OptionsObject::new();
        let b = OptionsObject::new();
        a.insert("child", b.clone());
        a.insert("name", "a");
        b.insert("child", a.clone());
        b.insert("name", "b");

        let merged = OptionsObject::new();
        merge_options(&merged, &a);
        assert_eq!(
            merged.to_json(),
            json!({"name": "a", "child": {"name": "b"}})
        );
    }

    #[test]
    fn self_referencing_parent_terminates() {
        let parent = OptionsObject::new();
        parent.insert("me", parent.clone());
        parent.insert("depth", 1.0);

        let child = OptionsObject::new();
        merge_options(&child, &parent);
        assert_eq!(child.to_json(), json!({"depth": 1}));
    }

    #[test]
    fn shared_non_cyclic_parent_nodes_are_copied_each_time() {
        let shared = tree(json!({"x": true}));
        let parent = OptionsObject::new();
        parent.insert("left", shared.clone());
        parent.insert("right", shared);

        let child = OptionsObject::new();
        merge_options(&child, &parent);
        assert_eq!(
            child.to_json(),
            json!({"left": {"x": true}, "right": {"x": true}})
        );
    }

    #[test]
    fn merging_into_itself_changes_nothing() {
        let options = tree(json!({"show": true, "webPreferences": {"sandbox": true}}));
        merge_options(&options, &options);
        assert_eq!(
            options.to_json(),
            json!({"show": true, "webPreferences": {"sandbox": true}})
        );
    }
}
