//! Accessibility tree traversal and structural addressing.
//!
//! [`build_tree_state`] flattens the control tree of the active window
//! (plus any always-on-top "other" surfaces) into interactive and
//! scrollable element lists.  Each element carries a structural address
//! built incrementally during the walk; [`resolve_xpath`] re-walks a live
//! tree to turn an address back into a control at action time.
//!
//! Addresses are deterministic for an unmutated tree.  If the UI mutates
//! between snapshot and action the address may miss or hit the wrong
//! control -- a documented race, not an error the walker can prevent.

pub mod element;

use std::collections::HashSet;

use regex::Regex;
use std::sync::OnceLock;

use element::{DomState, DomTextNode, ScrollElementNode, TreeElementNode, TreeState};

use crate::platform::{Control, ControlKind, Handle, Platform};
use crate::window::is_window_visible;

/// Maximum recursion depth, matching the walker's stack budget.
const MAX_DEPTH: usize = 50;

/// Maximum children considered per node, preventing memory exhaustion on
/// pathological trees (e.g. a grid with 100k cells).
const MAX_CHILDREN_PER_NODE: usize = 512;

/// Path separator inside structural addresses.
const XPATH_SEPARATOR: &str = "/";

fn xpath_step_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\w+)(?:\[(\d+)\])?$").unwrap())
}

/// 1-based position of `child` among `parent`'s same-kind children.
///
/// Falls back to 1 when the child is no longer present (the tree mutated
/// under us).
fn sibling_index<C: Control>(parent: &C, child: &C) -> usize {
    let kind = child.kind();
    let mut index = 0;
    for sibling in parent.children() {
        if sibling.kind() == kind {
            index += 1;
            if sibling.same_as(child) {
                return index;
            }
        }
    }
    1
}

/// Structural address of `control`, built by ascending to the root.
///
/// Each level contributes `Kind[index]`; the root contributes its kind
/// alone.  The walker calls this once per top-level surface and extends
/// the prefix incrementally while descending.
pub fn xpath_of<C: Control>(control: &C) -> String {
    let mut parts = Vec::new();
    let mut current = control.clone();
    loop {
        match current.parent() {
            Some(parent) => {
                let index = sibling_index(&parent, &current);
                parts.push(format!("{}[{index}]", current.kind().as_str()));
                current = parent;
            }
            None => {
                parts.push(current.kind().as_str().to_owned());
                break;
            }
        }
    }
    parts.reverse();
    parts.join(XPATH_SEPARATOR)
}

/// Resolve a structural address against a live tree rooted at `root`.
///
/// Returns `None` when any step has no matching child (the element is
/// gone or the tree reordered past recognition).
pub fn resolve_xpath<C: Control>(root: &C, xpath: &str) -> Option<C> {
    let mut parts = xpath.split(XPATH_SEPARATOR);
    let root_part = parts.next()?;
    if root_part != root.kind().as_str() {
        return None;
    }

    let step = xpath_step_regex();
    let mut current = root.clone();
    for part in parts {
        let captures = step.captures(part)?;
        let kind = ControlKind::from_name(captures.get(1)?.as_str())?;
        let index: usize = captures
            .get(2)
            .map(|m| m.as_str().parse().ok())
            .unwrap_or(Some(1))?;

        let mut seen = 0;
        let mut next = None;
        for child in current.children() {
            if child.kind() == kind {
                seen += 1;
                if seen == index {
                    next = Some(child);
                    break;
                }
            }
        }
        current = next?;
    }
    Some(current)
}

fn element_visible<C: Control>(control: &C) -> bool {
    control.is_enabled() && !control.is_offscreen() && !control.bounding_box().is_empty()
}

struct WalkOutput {
    interactive: Vec<TreeElementNode>,
    scrollable: Vec<ScrollElementNode>,
    seen_interactive: HashSet<String>,
    seen_scrollable: HashSet<String>,
}

fn walk<C: Control>(control: &C, xpath: &str, depth: usize, out: &mut WalkOutput) {
    if depth >= MAX_DEPTH {
        return;
    }

    if element_visible(control) {
        if control.kind().is_interactive() && out.seen_interactive.insert(xpath.to_owned()) {
            out.interactive.push(TreeElementNode {
                name: control.name(),
                control_kind: control.kind(),
                bounding_box: control.bounding_box(),
                xpath: xpath.to_owned(),
            });
        }
        if let Some(scroll) = control.scroll_info() {
            if (scroll.vertical_percent.is_some() || scroll.horizontal_percent.is_some())
                && out.seen_scrollable.insert(xpath.to_owned())
            {
                out.scrollable.push(ScrollElementNode {
                    name: control.name(),
                    control_kind: control.kind(),
                    bounding_box: control.bounding_box(),
                    xpath: xpath.to_owned(),
                    vertical_scroll_percent: scroll.vertical_percent,
                    horizontal_scroll_percent: scroll.horizontal_percent,
                });
            }
        }
    }

    let children = control.children();
    let mut kind_counts: std::collections::HashMap<ControlKind, usize> =
        std::collections::HashMap::new();
    for child in children.into_iter().take(MAX_CHILDREN_PER_NODE) {
        let count = kind_counts.entry(child.kind()).or_insert(0);
        *count += 1;
        let child_xpath = format!(
            "{xpath}{XPATH_SEPARATOR}{}[{}]",
            child.kind().as_str(),
            count
        );
        walk(&child, &child_xpath, depth + 1, out);
    }
}

/// Find the first browser document element within `control`'s subtree.
fn find_document<C: Control>(control: &C, xpath: &str, depth: usize) -> Option<(C, String)> {
    if depth >= MAX_DEPTH {
        return None;
    }
    if control.kind() == ControlKind::Document {
        return Some((control.clone(), xpath.to_owned()));
    }
    let mut kind_counts: std::collections::HashMap<ControlKind, usize> =
        std::collections::HashMap::new();
    for child in control.children().into_iter().take(MAX_CHILDREN_PER_NODE) {
        let count = kind_counts.entry(child.kind()).or_insert(0);
        *count += 1;
        let child_xpath = format!(
            "{xpath}{XPATH_SEPARATOR}{}[{}]",
            child.kind().as_str(),
            count
        );
        if let Some(found) = find_document(&child, &child_xpath, depth + 1) {
            return Some(found);
        }
    }
    None
}

fn collect_dom_texts<C: Control>(
    control: &C,
    xpath: &str,
    viewport: &crate::geometry::BoundingBox,
    depth: usize,
    out: &mut Vec<DomTextNode>,
) {
    if depth >= MAX_DEPTH {
        return;
    }

    if matches!(control.kind(), ControlKind::Text | ControlKind::Hyperlink) {
        let name = control.name();
        let bounds = control.bounding_box();
        if !name.trim().is_empty() && bounds.intersects(viewport) {
            out.push(DomTextNode {
                text: name,
                bounding_box: bounds,
                xpath: xpath.to_owned(),
            });
        }
    }

    let mut kind_counts: std::collections::HashMap<ControlKind, usize> =
        std::collections::HashMap::new();
    for child in control.children().into_iter().take(MAX_CHILDREN_PER_NODE) {
        let count = kind_counts.entry(child.kind()).or_insert(0);
        *count += 1;
        let child_xpath = format!(
            "{xpath}{XPATH_SEPARATOR}{}[{}]",
            child.kind().as_str(),
            count
        );
        collect_dom_texts(&child, &child_xpath, viewport, depth + 1, out);
    }
}

/// Extract in-viewport browser document text plus the vertical scroll
/// percentage used to tell the caller whether more content exists
/// above/below the viewport.
fn extract_dom<C: Control>(window: &C, window_xpath: &str) -> Option<DomState> {
    let (document, doc_xpath) = find_document(window, window_xpath, 0)?;
    let viewport = document.bounding_box();

    let mut texts = Vec::new();
    collect_dom_texts(&document, &doc_xpath, &viewport, 0, &mut texts);

    let vertical_scroll_percent = document
        .scroll_info()
        .and_then(|scroll| scroll.vertical_percent);

    Some(DomState {
        texts,
        vertical_scroll_percent,
    })
}

/// Build the flattened element view for one snapshot.
///
/// Walks the active window first, then every "other" surface (always-on-top
/// toolbars and popups that the classifier filtered out of the window
/// list).  A surface whose handle no longer resolves is logged and skipped.
/// When `use_dom` is set and the active window is a browser, document text
/// extraction replaces nothing -- it is additional state in `dom`.
pub fn build_tree_state<P: Platform>(
    platform: &P,
    active_handle: Option<Handle>,
    other_handles: &[Handle],
    use_dom: bool,
    active_is_browser: bool,
) -> TreeState {
    let mut out = WalkOutput {
        interactive: Vec::new(),
        scrollable: Vec::new(),
        seen_interactive: HashSet::new(),
        seen_scrollable: HashSet::new(),
    };
    let mut dom = None;

    let mut targets: Vec<(Handle, bool)> = Vec::new();
    if let Some(handle) = active_handle {
        targets.push((handle, true));
    }
    targets.extend(other_handles.iter().map(|&h| (h, false)));

    for (handle, is_active) in targets {
        let control = match platform.control_from_handle(handle) {
            Ok(control) => control,
            Err(err) => {
                log::warn!("tree walk skipping handle {handle}: {err}");
                continue;
            }
        };

        // Minimized or sliver "other" surfaces contribute nothing.
        if !is_active && !is_window_visible(&control) {
            continue;
        }

        let prefix = xpath_of(&control);
        walk(&control, &prefix, 0, &mut out);

        if is_active && use_dom && active_is_browser {
            dom = extract_dom(&control, &prefix);
        }
    }

    TreeState {
        interactive_nodes: out.interactive,
        scrollable_nodes: out.scrollable,
        dom,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;
    use crate::platform::fake::{FakeControl, FakePlatform};
    use crate::platform::ScrollInfo;

    fn bounds(left: i32, top: i32) -> BoundingBox {
        BoundingBox::new(left, top, left + 80, top + 24)
    }

    /// Root(Pane) -> Window -> [Button "OK", Text, Button "Cancel",
    /// List(scrollable) -> ListItem x2]
    fn sample_platform() -> FakePlatform {
        let platform = FakePlatform::new();
        let window = FakeControl::with(100, "Editor", crate::platform::ControlKind::Window, |s| {
            s.bounds = BoundingBox::new(0, 0, 800, 600);
        });
        window.add_child(FakeControl::with(
            0,
            "OK",
            crate::platform::ControlKind::Button,
            |s| s.bounds = bounds(10, 10),
        ));
        window.add_child(FakeControl::with(
            0,
            "hint",
            crate::platform::ControlKind::Text,
            |s| s.bounds = bounds(10, 40),
        ));
        window.add_child(FakeControl::with(
            0,
            "Cancel",
            crate::platform::ControlKind::Button,
            |s| s.bounds = bounds(10, 70),
        ));
        let list = window.add_child(FakeControl::with(
            0,
            "results",
            crate::platform::ControlKind::List,
            |s| {
                s.bounds = BoundingBox::new(10, 100, 400, 500);
                s.scroll = Some(ScrollInfo {
                    vertical_percent: Some(25.0),
                    horizontal_percent: None,
                });
            },
        ));
        list.add_child(FakeControl::with(
            0,
            "first",
            crate::platform::ControlKind::ListItem,
            |s| s.bounds = bounds(12, 110),
        ));
        list.add_child(FakeControl::with(
            0,
            "second",
            crate::platform::ControlKind::ListItem,
            |s| s.bounds = bounds(12, 140),
        ));
        platform.root.add_child(window);
        platform
    }

    #[test]
    fn test_flatten_and_sibling_indices() {
        let platform = sample_platform();
        let state = build_tree_state(&platform, Some(100), &[], false, false);

        let xpaths: Vec<&str> = state
            .interactive_nodes
            .iter()
            .map(|n| n.xpath.as_str())
            .collect();
        assert_eq!(
            xpaths,
            vec![
                "Pane/Window[1]/Button[1]",
                "Pane/Window[1]/Button[2]",
                "Pane/Window[1]/List[1]/ListItem[1]",
                "Pane/Window[1]/List[1]/ListItem[2]",
            ]
        );

        assert_eq!(state.scrollable_nodes.len(), 1);
        assert_eq!(state.scrollable_nodes[0].xpath, "Pane/Window[1]/List[1]");
        assert_eq!(
            state.scrollable_nodes[0].vertical_scroll_percent,
            Some(25.0)
        );
    }

    #[test]
    fn test_xpath_round_trip() {
        // Resolving an address immediately after the snapshot yields a
        // control with the same bounding box as recorded.
        let platform = sample_platform();
        let state = build_tree_state(&platform, Some(100), &[], false, false);
        let root = platform.root_control().unwrap();

        for node in &state.interactive_nodes {
            let control = resolve_xpath(&root, &node.xpath).expect("address must resolve");
            assert_eq!(control.bounding_box(), node.bounding_box);
            assert_eq!(control.name(), node.name);
        }
    }

    #[test]
    fn test_resolve_defaults_to_first_sibling() {
        let platform = sample_platform();
        let root = platform.root_control().unwrap();
        let control = resolve_xpath(&root, "Pane/Window[1]/Button").unwrap();
        assert_eq!(control.name(), "OK");
    }

    #[test]
    fn test_resolve_missing_element() {
        let platform = sample_platform();
        let root = platform.root_control().unwrap();
        assert!(resolve_xpath(&root, "Pane/Window[1]/Button[9]").is_none());
        assert!(resolve_xpath(&root, "Pane/Window[1]/Table[1]").is_none());
        assert!(resolve_xpath(&root, "Window/Button[1]").is_none()); // wrong root
    }

    #[test]
    fn test_xpath_of_matches_walk_addresses() {
        let platform = sample_platform();
        let root = platform.root_control().unwrap();
        let window = &root.children()[0];
        let cancel = &window.children()[2];
        assert_eq!(xpath_of(cancel), "Pane/Window[1]/Button[2]");
    }

    #[test]
    fn test_skips_disabled_offscreen_and_empty() {
        let platform = FakePlatform::new();
        let window = FakeControl::with(200, "W", crate::platform::ControlKind::Window, |s| {
            s.bounds = BoundingBox::new(0, 0, 400, 300);
        });
        window.add_child(FakeControl::with(
            0,
            "disabled",
            crate::platform::ControlKind::Button,
            |s| {
                s.bounds = bounds(0, 0);
                s.enabled = false;
            },
        ));
        window.add_child(FakeControl::with(
            0,
            "offscreen",
            crate::platform::ControlKind::Button,
            |s| {
                s.bounds = bounds(0, 30);
                s.offscreen = true;
            },
        ));
        window.add_child(FakeControl::new(
            0,
            "zero-size",
            crate::platform::ControlKind::Button,
        ));
        platform.root.add_child(window);

        let state = build_tree_state(&platform, Some(200), &[], false, false);
        assert!(state.interactive_nodes.is_empty());
    }

    #[test]
    fn test_other_surfaces_merged() {
        let platform = sample_platform();
        let toolbar = FakeControl::with(300, "Pinned Toolbar", crate::platform::ControlKind::Pane, |s| {
            s.bounds = BoundingBox::new(0, 1000, 1920, 1040);
        });
        toolbar.add_child(FakeControl::with(
            0,
            "Mute",
            crate::platform::ControlKind::Button,
            |s| s.bounds = bounds(4, 1004),
        ));
        platform.root.add_child(toolbar);

        let state = build_tree_state(&platform, Some(100), &[300], false, false);
        assert!(state
            .interactive_nodes
            .iter()
            .any(|n| n.name == "Mute" && n.xpath == "Pane/Pane[1]/Button[1]"));
    }

    #[test]
    fn test_minimized_other_surface_skipped() {
        let platform = sample_platform();
        let hidden = FakeControl::with(400, "Hidden", crate::platform::ControlKind::Pane, |s| {
            s.bounds = BoundingBox::new(0, 0, 500, 500);
            s.minimized = true;
        });
        hidden.add_child(FakeControl::with(
            0,
            "Ghost",
            crate::platform::ControlKind::Button,
            |s| s.bounds = bounds(5, 5),
        ));
        platform.root.add_child(hidden);

        let state = build_tree_state(&platform, Some(100), &[400], false, false);
        assert!(!state.interactive_nodes.iter().any(|n| n.name == "Ghost"));
    }

    #[test]
    fn test_dead_handle_never_aborts_walk() {
        let platform = sample_platform();
        let state = build_tree_state(&platform, Some(100), &[9999], false, false);
        assert!(!state.interactive_nodes.is_empty());
    }

    #[test]
    fn test_dom_extraction() {
        let platform = FakePlatform::new();
        let window = FakeControl::with(500, "Browser", crate::platform::ControlKind::Window, |s| {
            s.bounds = BoundingBox::new(0, 0, 1200, 800);
        });
        let document = window.add_child(FakeControl::with(
            0,
            "page",
            crate::platform::ControlKind::Document,
            |s| {
                s.bounds = BoundingBox::new(0, 80, 1200, 800);
                s.scroll = Some(ScrollInfo {
                    vertical_percent: Some(40.0),
                    horizontal_percent: None,
                });
            },
        ));
        document.add_child(FakeControl::with(
            0,
            "Welcome to the page",
            crate::platform::ControlKind::Text,
            |s| s.bounds = BoundingBox::new(20, 100, 400, 120),
        ));
        document.add_child(FakeControl::with(
            0,
            "below the fold",
            crate::platform::ControlKind::Text,
            |s| s.bounds = BoundingBox::new(20, 900, 400, 920),
        ));
        platform.root.add_child(window);

        let state = build_tree_state(&platform, Some(500), &[], true, true);
        let dom = state.dom.expect("browser window must yield dom state");
        assert_eq!(dom.vertical_scroll_percent, Some(40.0));
        assert_eq!(dom.texts.len(), 1);
        assert_eq!(dom.texts[0].text, "Welcome to the page");

        // Non-browser window: no dom even when requested.
        let state = build_tree_state(&platform, Some(500), &[], true, false);
        assert!(state.dom.is_none());
    }
}
