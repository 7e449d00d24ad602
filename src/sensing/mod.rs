pub mod classifier;
pub mod detector;
pub mod snapshot;

pub use classifier::{classify, Indicators, DEFAULT_INDICATORS};
pub use detector::{ModeDetector, ModeEdge, DEBOUNCE_WINDOW_MS};
pub use snapshot::{HostEvent, UiNode, UiSnapshot};
