//! Owned element records produced by the tree walker.
//!
//! Every record carries a structural address ("xpath"): the path from the
//! accessibility root to the element, one `Kind[index]` step per level,
//! where the index is 1-based among same-kind siblings.  The address is
//! recomputable from a live control tree, which is how action tools
//! re-locate a control from a label after the snapshot.

use serde::Serialize;

use crate::geometry::BoundingBox;
use crate::platform::ControlKind;

/// One interactive (clickable / typeable) element.
#[derive(Debug, Clone, Serialize)]
pub struct TreeElementNode {
    pub name: String,
    pub control_kind: ControlKind,
    pub bounding_box: BoundingBox,
    pub xpath: String,
}

/// One scrollable region, addressed the same way as interactive elements.
#[derive(Debug, Clone, Serialize)]
pub struct ScrollElementNode {
    pub name: String,
    pub control_kind: ControlKind,
    pub bounding_box: BoundingBox,
    pub xpath: String,
    pub vertical_scroll_percent: Option<f64>,
    pub horizontal_scroll_percent: Option<f64>,
}

/// One in-viewport browser text node.
#[derive(Debug, Clone, Serialize)]
pub struct DomTextNode {
    pub text: String,
    pub bounding_box: BoundingBox,
    pub xpath: String,
}

/// Browser document content extracted through the accessibility bridge.
///
/// `vertical_scroll_percent` tells the caller whether more content exists
/// above/below the viewport (0 = top, 100 = bottom).
#[derive(Debug, Clone, Serialize)]
pub struct DomState {
    pub texts: Vec<DomTextNode>,
    pub vertical_scroll_percent: Option<f64>,
}

/// The flattened element view of one snapshot.
///
/// Positional indices into `interactive_nodes` are the labels handed to
/// the external agent; their validity is scoped to this snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TreeState {
    pub interactive_nodes: Vec<TreeElementNode>,
    pub scrollable_nodes: Vec<ScrollElementNode>,
    pub dom: Option<DomState>,
}
