//! Advice bank: replies remembered through session feedback.
//!
//! Each rated reply is keyed by the context it was given in. Retrieval ranks
//! rows by how much of that context matches the current one, plus the
//! accumulated feedback score.

use chrono::Utc;
use rusqlite::params;

use super::models::key_text;
use super::{AdviceQuery, Database, Feedback};
use crate::error::{DatabaseError, ServiceResult};
use crate::session::Session;

impl Database {
    /// Apply a session's feedback to every reply it produced. Returns the
    /// number of rows touched.
    pub fn record_feedback(&self, session: &Session, feedback: &Feedback) -> ServiceResult<usize> {
        let delta = feedback.rating.delta();
        let (positive, negative) = if delta > 0 { (1, 0) } else { (0, 1) };
        let now = Utc::now().to_rfc3339();

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(DatabaseError::Query)?;

        let mut touched = 0;
        for entry in session.history.iter().filter(|e| !e.reply.trim().is_empty()) {
            touched += tx
                .execute(
                    "INSERT INTO advice_bank \
                     (champion, lane, enemy, intent, phase, standing, reply_text, positive, negative, score, last_seen) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
                     ON CONFLICT(champion, lane, enemy, intent, phase, standing, reply_text) DO UPDATE SET \
                     positive = positive + excluded.positive, \
                     negative = negative + excluded.negative, \
                     score = score + excluded.score, \
                     last_seen = excluded.last_seen",
                    params![
                        key_text(entry.context.champion.as_deref()),
                        key_text(entry.context.lane),
                        key_text(entry.context.enemy.as_deref()),
                        key_text(Some(entry.intent)),
                        key_text(entry.context.phase),
                        key_text(entry.context.standing),
                        entry.reply.trim(),
                        positive,
                        negative,
                        delta,
                        now,
                    ],
                )
                .map_err(DatabaseError::Query)?;
        }

        tx.commit().map_err(DatabaseError::Query)?;
        Ok(touched)
    }

    /// Best remembered replies for a context. Only positively scored rows
    /// sharing at least one context field are returned.
    pub fn retrieve_advice(&self, query: &AdviceQuery, limit: u32) -> ServiceResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                r#"
                SELECT reply_text FROM (
                    SELECT reply_text, score, last_seen,
                        (CASE WHEN ?1 <> '' AND champion = ?1 THEN 3 ELSE 0 END
                       + CASE WHEN ?2 <> '' AND lane = ?2 THEN 2 ELSE 0 END
                       + CASE WHEN ?3 <> '' AND enemy = ?3 THEN 2 ELSE 0 END
                       + CASE WHEN ?4 <> '' AND intent = ?4 THEN 2 ELSE 0 END
                       + CASE WHEN ?5 <> '' AND phase = ?5 THEN 1 ELSE 0 END
                       + CASE WHEN ?6 <> '' AND standing = ?6 THEN 1 ELSE 0 END) AS matched
                    FROM advice_bank
                    WHERE score > 0
                )
                WHERE matched > 0
                ORDER BY matched + score DESC, score DESC, last_seen DESC
                LIMIT ?7
                "#,
            )
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(
                params![
                    key_text(query.champion.as_deref()),
                    key_text(query.lane),
                    key_text(query.enemy.as_deref()),
                    key_text(query.intent),
                    key_text(query.phase),
                    key_text(query.standing),
                    limit,
                ],
                |row| row.get(0),
            )
            .map_err(DatabaseError::Query)?;

        rows.collect::<Result<Vec<String>, _>>()
            .map_err(DatabaseError::Query)
            .map_err(Into::into)
    }
}
