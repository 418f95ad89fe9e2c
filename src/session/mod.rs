pub mod manager;
pub mod memory;
pub mod record;
pub mod sqlite;
pub mod store;
pub mod transcript;

pub use manager::{SessionManager, SessionPolicy};
pub use memory::InMemorySessionStore;
pub use record::{ConversationRecord, Scratch, Turn, session_key};
pub use sqlite::SqliteSessionStore;
pub use store::{CommitOutcome, SessionStore};
