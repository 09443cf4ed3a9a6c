pub mod ai;
pub mod content;
pub mod feedback;
pub mod quiz;
