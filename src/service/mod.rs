pub mod category;
pub mod columns;
pub mod ingest;
pub mod matching;
pub mod numeric;
pub mod offers;
pub mod search_text;

pub use ingest::IngestService;
pub use matching::{CandidateFilters, MatchEngine};
pub use offers::OfferLifecycle;
pub use search_text::NormalizerConfig;
