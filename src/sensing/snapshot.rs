use serde::{Deserialize, Serialize};

/// One accessibility node, already copied out of the host's tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiNode {
    /// Resource identifier, e.g. `com.google.android.youtube:id/reel_player_page_container`.
    pub identifier: Option<String>,
    /// Accessible label (content description).
    pub label: Option<String>,
    /// Visible text.
    pub text: Option<String>,
    /// Indices into the owning snapshot's node list.
    pub children: Vec<usize>,
}

impl UiNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Immutable, fully materialised UI tree. Node 0 is the root.
///
/// The host binding owns the lifetime of whatever native handles it walked to
/// build this; the classifier only ever sees plain data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiSnapshot {
    pub nodes: Vec<UiNode>,
}

impl UiSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends a node and returns its index.
    pub fn push(&mut self, node: UiNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Appends `node` as a child of `parent` and returns its index.
    /// An out-of-range `parent` leaves the node unreachable.
    pub fn push_child(&mut self, parent: usize, node: UiNode) -> usize {
        let index = self.push(node);
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.push(index);
        }
        index
    }
}

/// A UI-change notification from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostEvent {
    /// Package that owns the foreground window.
    pub package: String,
    /// `None` when the host reports no active window.
    #[serde(default)]
    pub snapshot: Option<UiSnapshot>,
}

impl HostEvent {
    pub fn new(package: impl Into<String>, snapshot: Option<UiSnapshot>) -> Self {
        Self {
            package: package.into(),
            snapshot,
        }
    }
}
