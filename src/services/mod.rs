pub mod ai;
pub mod billing;
pub mod content;
pub mod feedback;
pub mod progress;
pub mod sessions;
