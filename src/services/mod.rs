pub mod candidates;
pub mod integrity;
pub mod movies;
pub mod preferences;
pub mod scoring;
pub mod suggestions;

pub use integrity::{CascadeReport, Deleted};
pub use suggestions::{GenerationOutcome, SuggestionView};
