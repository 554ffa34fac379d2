//! Quiz persistence
//!
//! Writes a finished [`QuizDraft`] inside one transaction. The write is
//! all-or-nothing: any question without exactly one correct answer aborts
//! it, and the uncommitted transaction rolls back on drop.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use tracing::{debug, info, warn};

use crate::constants::quiz::DEFAULT_TOPIC;
use crate::types::{
    OptionDraft, QuestionDraft, QuizDraft, QuizError, QuizId, Result, ResultExt, UserId,
};

use super::database::{Database, PooledSqlite, SharedDatabase};

/// Source material linked to a stored quiz
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialRecord {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// Counts reported back after a successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedQuiz {
    pub id: QuizId,
    pub questions: usize,
    pub answers: usize,
    /// Malformed questions left out of the write
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredQuiz {
    pub id: QuizId,
    pub owner: UserId,
    pub title: String,
    pub questions: Vec<QuestionDraft>,
    pub materials: Vec<String>,
}

// =============================================================================
// Store Traits
// =============================================================================

/// One open write. Dropping it without [`QuizTransaction::commit`] discards
/// everything written through it.
pub trait QuizTransaction {
    fn create_quiz(&mut self, owner: &UserId, title: &str) -> Result<QuizId>;

    fn create_question(
        &mut self,
        quiz: &QuizId,
        owner: &UserId,
        topic: &str,
        text: &str,
        position: usize,
    ) -> Result<i64>;

    fn create_answer(&mut self, question_id: i64, option: &OptionDraft, position: usize)
    -> Result<i64>;

    fn link_material(
        &mut self,
        quiz: &QuizId,
        owner: &UserId,
        material: &MaterialRecord,
    ) -> Result<i64>;

    fn commit(self: Box<Self>) -> Result<()>;
}

pub trait QuizStore: Send + Sync {
    fn begin(&self) -> Result<Box<dyn QuizTransaction + '_>>;

    fn load_quiz(&self, id: &QuizId) -> Result<Option<StoredQuiz>>;
}

/// Write `draft` for `owner`, linking `materials`, in one transaction.
///
/// Questions with blank text or the wrong option count are skipped. A blank
/// topic is stored as `General`.
pub fn persist_quiz(
    store: &dyn QuizStore,
    owner: &UserId,
    draft: &QuizDraft,
    materials: &[MaterialRecord],
) -> Result<PersistedQuiz> {
    let mut tx = store.begin()?;
    let quiz_id = tx.create_quiz(owner, &draft.title)?;

    let mut questions = 0;
    let mut answers = 0;
    let mut skipped = 0;
    for question in &draft.questions {
        if !question.is_well_formed() {
            warn!(question = %question.text, "Skipping malformed question");
            skipped += 1;
            continue;
        }

        let topic = match question.topic.trim() {
            "" => DEFAULT_TOPIC,
            topic => topic,
        };
        let question_id = tx.create_question(&quiz_id, owner, topic, &question.text, questions)?;

        let mut correct = 0;
        for (position, option) in question.options.iter().enumerate() {
            tx.create_answer(question_id, option, position)?;
            if option.is_correct {
                correct += 1;
            }
        }
        answers += question.options.len();

        if correct != 1 {
            return Err(QuizError::InvalidCorrectCount {
                count: correct,
                question: question.text.clone(),
            });
        }
        questions += 1;
    }

    for material in materials {
        tx.link_material(&quiz_id, owner, material)?;
    }

    tx.commit()?;
    info!(quiz = %quiz_id, questions, answers, skipped, "Stored quiz");

    Ok(PersistedQuiz {
        id: quiz_id,
        questions,
        answers,
        skipped,
    })
}

// =============================================================================
// SQLite Store
// =============================================================================

pub struct SqliteQuizStore {
    db: SharedDatabase,
}

impl SqliteQuizStore {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Open (creating if needed) and initialize the database at `path`
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let db = Database::open(path)?;
        db.initialize()?;
        Ok(Self::new(db.into()))
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        db.initialize()?;
        Ok(Self::new(db.into()))
    }

    fn load_questions(conn: &PooledSqlite, id: &QuizId) -> Result<Vec<QuestionDraft>> {
        let mut stmt = conn
            .prepare(
                "SELECT q.id, q.text, t.name FROM questions q
                 JOIN topics t ON t.id = q.topic_id
                 WHERE q.quiz_id = ?1 ORDER BY q.position",
            )
            .with_context("Failed to prepare question query")?;
        let rows = stmt
            .query_map(params![id.as_str()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .with_context("Failed to query questions")?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut answer_stmt = conn
            .prepare(
                "SELECT text, is_correct, explanation FROM answers
                 WHERE question_id = ?1 ORDER BY position",
            )
            .with_context("Failed to prepare answer query")?;

        let mut questions = Vec::with_capacity(rows.len());
        for (question_id, text, topic) in rows {
            let options = answer_stmt
                .query_map(params![question_id], |row| {
                    Ok(OptionDraft {
                        text: row.get(0)?,
                        is_correct: row.get(1)?,
                        explanation: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            questions.push(QuestionDraft {
                text,
                topic,
                options,
            });
        }
        Ok(questions)
    }
}

impl QuizStore for SqliteQuizStore {
    fn begin(&self) -> Result<Box<dyn QuizTransaction + '_>> {
        let conn = self.db.connection()?;
        conn.execute_batch("BEGIN IMMEDIATE")
            .with_context("Failed to start transaction")?;
        Ok(Box::new(SqliteTransaction {
            conn,
            finished: false,
        }))
    }

    fn load_quiz(&self, id: &QuizId) -> Result<Option<StoredQuiz>> {
        let conn = self.db.connection()?;
        let header = conn
            .query_row(
                "SELECT owner_id, title FROM quizzes WHERE id = ?1",
                params![id.as_str()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .with_context("Failed to load quiz")?;

        let Some((owner, title)) = header else {
            return Ok(None);
        };

        let questions = Self::load_questions(&conn, id)?;

        let mut stmt = conn
            .prepare(
                "SELECT m.name FROM quiz_materials qm
                 JOIN materials m ON m.id = qm.material_id
                 WHERE qm.quiz_id = ?1 ORDER BY m.id",
            )
            .with_context("Failed to prepare material query")?;
        let materials = stmt
            .query_map(params![id.as_str()], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(Some(StoredQuiz {
            id: id.clone(),
            owner: UserId::new(owner),
            title,
            questions,
            materials,
        }))
    }
}

struct SqliteTransaction {
    conn: PooledSqlite,
    finished: bool,
}

impl SqliteTransaction {
    fn get_or_create_topic(&self, owner: &UserId, name: &str) -> Result<i64> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO topics (owner_id, name) VALUES (?1, ?2)",
                params![owner.as_str(), name],
            )
            .with_context("Failed to create topic")?;
        let id: i64 = self
            .conn
            .query_row(
                "SELECT id FROM topics WHERE owner_id = ?1 AND name = ?2",
                params![owner.as_str(), name],
                |row| row.get(0),
            )
            .with_context("Failed to look up topic")?;
        Ok(id)
    }
}

impl QuizTransaction for SqliteTransaction {
    fn create_quiz(&mut self, owner: &UserId, title: &str) -> Result<QuizId> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT OR IGNORE INTO users (id, created_at) VALUES (?1, ?2)",
                params![owner.as_str(), now],
            )
            .with_context("Failed to register quiz owner")?;

        let id = QuizId::generate();
        self.conn
            .execute(
                "INSERT INTO quizzes (id, owner_id, title, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id.as_str(), owner.as_str(), title, now],
            )
            .with_context("Failed to create quiz")?;
        debug!(quiz = %id, "Created quiz row");
        Ok(id)
    }

    fn create_question(
        &mut self,
        quiz: &QuizId,
        owner: &UserId,
        topic: &str,
        text: &str,
        position: usize,
    ) -> Result<i64> {
        let topic_id = self.get_or_create_topic(owner, topic)?;
        self.conn
            .execute(
                "INSERT INTO questions (quiz_id, topic_id, text, position) VALUES (?1, ?2, ?3, ?4)",
                params![quiz.as_str(), topic_id, text, position as i64],
            )
            .with_context("Failed to create question")?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_answer(
        &mut self,
        question_id: i64,
        option: &OptionDraft,
        position: usize,
    ) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO answers (question_id, text, is_correct, explanation, position)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    question_id,
                    option.text,
                    option.is_correct,
                    option.explanation,
                    position as i64
                ],
            )
            .with_context("Failed to create answer")?;
        Ok(self.conn.last_insert_rowid())
    }

    fn link_material(
        &mut self,
        quiz: &QuizId,
        owner: &UserId,
        material: &MaterialRecord,
    ) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO materials (owner_id, name, mime_type, size_bytes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    owner.as_str(),
                    material.name,
                    material.mime_type,
                    i64::try_from(material.size_bytes).unwrap_or(i64::MAX),
                    Utc::now().to_rfc3339()
                ],
            )
            .with_context("Failed to create material")?;
        let material_id = self.conn.last_insert_rowid();

        self.conn
            .execute(
                "INSERT INTO quiz_materials (quiz_id, material_id) VALUES (?1, ?2)",
                params![quiz.as_str(), material_id],
            )
            .with_context("Failed to link material")?;
        Ok(material_id)
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .with_context("Failed to commit transaction")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if !self.finished
            && let Err(e) = self.conn.execute_batch("ROLLBACK")
        {
            warn!(error = %e, "Failed to roll back quiz transaction");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::quiz::fixtures::{question, quiz};

    fn owner() -> UserId {
        UserId::new("user-1")
    }

    fn count(store: &SqliteQuizStore, table: &str) -> i64 {
        store
            .db
            .connection()
            .unwrap()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
            .unwrap()
    }

    fn material(name: &str) -> MaterialRecord {
        MaterialRecord {
            name: name.to_string(),
            mime_type: "application/pdf".to_string(),
            size_bytes: 1024,
        }
    }

    #[test]
    fn test_persist_and_load_roundtrip() {
        let store = SqliteQuizStore::open_in_memory().unwrap();
        let draft = quiz("Borrowing", 3, "borrow");

        let persisted =
            persist_quiz(&store, &owner(), &draft, &[material("notes.pdf")]).unwrap();
        assert_eq!(persisted.questions, 3);
        assert_eq!(persisted.answers, 12);
        assert_eq!(persisted.skipped, 0);

        let loaded = store.load_quiz(&persisted.id).unwrap().unwrap();
        assert_eq!(loaded.title, "Borrowing");
        assert_eq!(loaded.owner, owner());
        assert_eq!(loaded.questions, draft.questions);
        assert_eq!(loaded.materials, vec!["notes.pdf"]);
    }

    #[test]
    fn test_blank_topic_becomes_general() {
        let store = SqliteQuizStore::open_in_memory().unwrap();
        let draft = QuizDraft::new("T", vec![question("What is a trait?", "  ")]);

        let persisted = persist_quiz(&store, &owner(), &draft, &[]).unwrap();
        let loaded = store.load_quiz(&persisted.id).unwrap().unwrap();
        assert_eq!(loaded.questions[0].topic, "General");
    }

    #[test]
    fn test_topics_shared_per_owner() {
        let store = SqliteQuizStore::open_in_memory().unwrap();
        persist_quiz(&store, &owner(), &quiz("A", 2, "memory"), &[]).unwrap();
        persist_quiz(&store, &owner(), &quiz("B", 2, "memory"), &[]).unwrap();
        persist_quiz(&store, &UserId::new("user-2"), &quiz("C", 1, "memory"), &[]).unwrap();

        assert_eq!(count(&store, "topics"), 2);
        assert_eq!(count(&store, "quizzes"), 3);
    }

    #[test]
    fn test_malformed_questions_skipped() {
        let store = SqliteQuizStore::open_in_memory().unwrap();
        let mut draft = quiz("T", 3, "q");
        draft.questions[0].options.pop();
        draft.questions[2].text.clear();

        let persisted = persist_quiz(&store, &owner(), &draft, &[]).unwrap();
        assert_eq!(persisted.questions, 1);
        assert_eq!(persisted.skipped, 2);
        assert_eq!(count(&store, "answers"), 4);
    }

    #[test]
    fn test_wrong_correct_count_rolls_back_everything() {
        let store = SqliteQuizStore::open_in_memory().unwrap();
        let mut draft = quiz("T", 3, "q");
        draft.questions[1].options[2].is_correct = true;

        let err = persist_quiz(&store, &owner(), &draft, &[material("a.pdf")]).unwrap_err();
        assert!(matches!(
            err,
            QuizError::InvalidCorrectCount { count: 2, ref question } if question == "q question 1"
        ));

        for table in ["quizzes", "questions", "answers", "materials", "quiz_materials"] {
            assert_eq!(count(&store, table), 0, "{} not rolled back", table);
        }
    }

    #[test]
    fn test_no_correct_answer_rejected() {
        let store = SqliteQuizStore::open_in_memory().unwrap();
        let mut draft = quiz("T", 1, "q");
        draft.questions[0].options[0].is_correct = false;

        let err = persist_quiz(&store, &owner(), &draft, &[]).unwrap_err();
        assert!(matches!(err, QuizError::InvalidCorrectCount { count: 0, .. }));
    }

    #[test]
    fn test_store_usable_after_rollback() {
        let store = SqliteQuizStore::open_in_memory().unwrap();
        let mut bad = quiz("Bad", 1, "q");
        bad.questions[0].options[1].is_correct = true;
        assert!(persist_quiz(&store, &owner(), &bad, &[]).is_err());

        let persisted = persist_quiz(&store, &owner(), &quiz("Good", 1, "q"), &[]).unwrap();
        assert!(store.load_quiz(&persisted.id).unwrap().is_some());
    }

    #[test]
    fn test_load_missing_quiz() {
        let store = SqliteQuizStore::open_in_memory().unwrap();
        assert!(store.load_quiz(&QuizId::generate()).unwrap().is_none());
    }

    #[test]
    fn test_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quizforge.db");
        let id = {
            let store = SqliteQuizStore::open(&path).unwrap();
            persist_quiz(&store, &owner(), &quiz("Disk", 2, "d"), &[]).unwrap().id
        };

        let reopened = SqliteQuizStore::open(&path).unwrap();
        let loaded = reopened.load_quiz(&id).unwrap().unwrap();
        assert_eq!(loaded.questions.len(), 2);
    }
}
