use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-user counters. Rows are created on first contact and never deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: i64,
    pub username: Option<String>,
    pub quizzes_received: i64,
    pub answers_given: i64,
    pub correct_answers: i64,
    pub first_seen: String,
    pub last_seen: String,
}

/// Interaction events that bump a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatsEvent {
    QuizSent,
    AnswerReceived,
    CorrectAnswer,
}

impl StatsEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatsEvent::QuizSent => "quiz-sent",
            StatsEvent::AnswerReceived => "answer-received",
            StatsEvent::CorrectAnswer => "correct-answer",
        }
    }

    /// Increments for (quizzes_received, answers_given, correct_answers).
    fn deltas(self) -> (i64, i64, i64) {
        match self {
            StatsEvent::QuizSent => (1, 0, 0),
            StatsEvent::AnswerReceived => (0, 1, 0),
            StatsEvent::CorrectAnswer => (0, 0, 1),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub username: Option<String>,
    pub correct_answers: i64,
    pub answers_given: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsSummary {
    pub total_users: i64,
    pub total_quizzes_served: i64,
    pub total_answers: i64,
    pub total_correct: i64,
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Set when the summary was requested for a single user.
    pub user: Option<UserRecord>,
}

const UPSERT_SQL: &str = r#"
    INSERT INTO users (user_id, username, quizzes_received, answers_given, correct_answers, first_seen, last_seen)
    VALUES (?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(user_id) DO UPDATE SET
        username = COALESCE(excluded.username, users.username),
        quizzes_received = users.quizzes_received + excluded.quizzes_received,
        answers_given = users.answers_given + excluded.answers_given,
        correct_answers = users.correct_answers + excluded.correct_answers,
        last_seen = excluded.last_seen
"#;

impl UserRecord {
    /// Single-statement upsert: creates the row if needed and bumps the event's counter.
    pub async fn record_event(
        pool: &sqlx::SqlitePool,
        user_id: i64,
        username: Option<&str>,
        event: StatsEvent,
    ) -> Result<(), sqlx::Error> {
        let (quizzes, answers, correct) = event.deltas();
        Self::upsert(pool, user_id, username, quizzes, answers, correct).await
    }

    /// Refreshes username and last-seen without touching counters.
    pub async fn touch(
        pool: &sqlx::SqlitePool,
        user_id: i64,
        username: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        Self::upsert(pool, user_id, username, 0, 0, 0).await
    }

    async fn upsert(
        pool: &sqlx::SqlitePool,
        user_id: i64,
        username: Option<&str>,
        quizzes: i64,
        answers: i64,
        correct: i64,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(UPSERT_SQL)
            .bind(user_id)
            .bind(username)
            .bind(quizzes)
            .bind(answers)
            .bind(correct)
            .bind(now.clone())
            .bind(now)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn find_by_id(
        pool: &sqlx::SqlitePool,
        user_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, username, quizzes_received, answers_given, correct_answers, first_seen, last_seen
             FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn all_ids(pool: &sqlx::SqlitePool) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT user_id FROM users ORDER BY user_id")
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &sqlx::SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
    }

    /// Totals plus the top `limit` users by correct answers.
    pub async fn summary(
        pool: &sqlx::SqlitePool,
        limit: i64,
    ) -> Result<StatsSummary, sqlx::Error> {
        let (total_users, total_quizzes_served, total_answers, total_correct) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                r#"
                SELECT
                    CAST(COUNT(*) AS INTEGER),
                    CAST(COALESCE(SUM(quizzes_received), 0) AS INTEGER),
                    CAST(COALESCE(SUM(answers_given), 0) AS INTEGER),
                    CAST(COALESCE(SUM(correct_answers), 0) AS INTEGER)
                FROM users
                "#,
            )
            .fetch_one(pool)
            .await?;

        let leaderboard = sqlx::query_as::<_, LeaderboardEntry>(
            "SELECT user_id, username, correct_answers, answers_given
             FROM users
             WHERE answers_given > 0
             ORDER BY correct_answers DESC, answers_given DESC, user_id ASC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(StatsSummary {
            total_users,
            total_quizzes_served,
            total_answers,
            total_correct,
            leaderboard,
            user: None,
        })
    }
}
