//! Retrieval-augmented generation: passage storage, search, and prompt
//! assembly for the handbook corpus.

pub mod passage;
pub mod prompt;
pub mod retriever;
pub mod sqlite;
pub mod store;

pub use passage::{Passage, PassageMetadata, ScoredPassage};
pub use prompt::{build_system_message, REFUSAL_GUIDANCE};
pub use retriever::{RetrievalResult, Retriever};
pub use sqlite::SqlitePassageStore;
pub use store::PassageStore;
