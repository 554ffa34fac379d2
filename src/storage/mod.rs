pub mod database;
pub mod quiz_store;

pub use database::{Database, PoolConfig, SharedDatabase};
pub use quiz_store::{
    MaterialRecord, PersistedQuiz, QuizStore, QuizTransaction, SqliteQuizStore, StoredQuiz,
    persist_quiz,
};
