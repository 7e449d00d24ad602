use std::collections::VecDeque;

use super::snapshot::{UiNode, UiSnapshot};

pub const DEFAULT_INDICATORS: [&str; 5] = [
    "Shorts",
    "shorts_pivot_button",
    "reel_player_page_container",
    "shorts_video_view",
    "ShortsFragment",
];

/// Strings that mark the monitored content mode.
#[derive(Debug, Clone)]
pub struct Indicators {
    exact: Vec<String>,
    folded: Vec<String>,
}

impl Indicators {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let exact: Vec<String> = markers
            .into_iter()
            .map(Into::into)
            .filter(|marker: &String| !marker.is_empty())
            .collect();
        let folded = exact.iter().map(|marker| marker.to_lowercase()).collect();
        Self { exact, folded }
    }

    /// Identifiers and labels: case-insensitive substring.
    fn loosely_matches(&self, value: &str) -> bool {
        let value = value.to_lowercase();
        self.folded.iter().any(|marker| value.contains(marker.as_str()))
    }

    /// Visible text: exact match only, so a video titled "My shorts haul"
    /// does not count.
    fn exactly_matches(&self, value: &str) -> bool {
        self.exact.iter().any(|marker| marker == value)
    }

    fn matches(&self, node: &UiNode) -> bool {
        node.identifier
            .as_deref()
            .is_some_and(|id| self.loosely_matches(id))
            || node
                .label
                .as_deref()
                .is_some_and(|label| self.loosely_matches(label))
            || node
                .text
                .as_deref()
                .is_some_and(|text| self.exactly_matches(text))
    }
}

impl Default for Indicators {
    fn default() -> Self {
        Self::new(DEFAULT_INDICATORS)
    }
}

/// Breadth-first scan from the root for any indicator node.
///
/// Bounded by the node count: every reachable node is visited at most once,
/// so malformed trees (cycles, dangling child indices) still terminate.
pub fn classify(snapshot: &UiSnapshot, indicators: &Indicators) -> bool {
    if snapshot.is_empty() {
        return false;
    }

    let mut visited = vec![false; snapshot.len()];
    let mut queue = VecDeque::with_capacity(snapshot.len());
    visited[0] = true;
    queue.push_back(0usize);

    while let Some(index) = queue.pop_front() {
        let node = &snapshot.nodes[index];
        if indicators.matches(node) {
            return true;
        }

        for &child in &node.children {
            if child < visited.len() && !visited[child] {
                visited[child] = true;
                queue.push_back(child);
            }
        }
    }

    false
}
