//! Conversation persistence: threads, append-only messages, expiry.

use chrono::{DateTime, Utc};
use sqlx::Row;

use super::{format_timestamp, parse_timestamp, Repository};
use crate::errors::AppError;
use crate::models::{Conversation, Message};

const CONVERSATION_COLUMNS: &str =
    "id, service_request_id, participant_a, participant_b, expires_at, created_at, updated_at";

impl Repository {
    // ==================== CONVERSATION OPERATIONS ====================

    /// Get a conversation with its messages. With `live_at`, conversations
    /// whose deadline has passed by then are reported as missing; without it
    /// anything not yet reaped is returned.
    pub async fn get_conversation(
        &self,
        id: &str,
        live_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Conversation>, AppError> {
        let live_at = live_at.map(|now| format_timestamp(&now));
        let row = sqlx::query(&format!(
            "SELECT {} FROM conversations WHERE id = ? AND (? IS NULL OR expires_at IS NULL OR expires_at > ?)",
            CONVERSATION_COLUMNS
        ))
        .bind(id)
        .bind(&live_at)
        .bind(&live_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut conversation = conversation_from_row(&row);
                conversation.messages = self.messages(&conversation.id).await?;
                Ok(Some(conversation))
            }
            None => Ok(None),
        }
    }

    /// The live conversation between two users about one request, in either
    /// participant order.
    pub async fn find_conversation(
        &self,
        request_id: &str,
        first: &str,
        second: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Conversation>, AppError> {
        let row = sqlx::query(
            r#"SELECT id FROM conversations
               WHERE service_request_id = ?
                 AND ((participant_a = ? AND participant_b = ?) OR (participant_a = ? AND participant_b = ?))
                 AND (expires_at IS NULL OR expires_at > ?)
               ORDER BY created_at, rowid
               LIMIT 1"#,
        )
        .bind(request_id)
        .bind(first)
        .bind(second)
        .bind(second)
        .bind(first)
        .bind(format_timestamp(&now))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let id: String = row.get("id");
                self.get_conversation(&id, Some(now)).await
            }
            None => Ok(None),
        }
    }

    /// A user's live conversations, most recently active first.
    pub async fn list_conversations_for(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Conversation>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM conversations WHERE (participant_a = ? OR participant_b = ?) AND (expires_at IS NULL OR expires_at > ?) ORDER BY updated_at DESC, rowid DESC",
            CONVERSATION_COLUMNS
        ))
        .bind(user_id)
        .bind(user_id)
        .bind(format_timestamp(&now))
        .fetch_all(&self.pool)
        .await?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut conversation = conversation_from_row(row);
            conversation.messages = self.messages(&conversation.id).await?;
            conversations.push(conversation);
        }
        Ok(conversations)
    }

    /// Start a conversation, optionally with a first message from `participants[0]`.
    pub async fn create_conversation(
        &self,
        request_id: &str,
        participants: [String; 2],
        first_message: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Conversation, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let stamp = format_timestamp(&now);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO conversations (id, service_request_id, participant_a, participant_b, expires_at, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(request_id)
        .bind(&participants[0])
        .bind(&participants[1])
        .bind(expires_at.as_ref().map(format_timestamp))
        .bind(&stamp)
        .bind(&stamp)
        .execute(&mut *tx)
        .await?;

        let mut messages = Vec::new();
        if let Some(body) = first_message {
            sqlx::query(
                "INSERT INTO messages (conversation_id, sender_id, body, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(&participants[0])
            .bind(body)
            .bind(&stamp)
            .execute(&mut *tx)
            .await?;

            messages.push(Message {
                sender: participants[0].clone(),
                body: body.to_string(),
                created_at: now,
            });
        }

        tx.commit().await?;

        Ok(Conversation {
            id,
            participants,
            service_request: request_id.to_string(),
            messages,
            expires_at,
            created_at: now,
            updated_at: now,
        })
    }

    /// Append a message and reset the conversation's deadline.
    pub async fn append_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        body: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Message, AppError> {
        let now = Utc::now();
        let stamp = format_timestamp(&now);

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE conversations SET expires_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(expires_at.as_ref().map(format_timestamp))
        .bind(&stamp)
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Conversation"));
        }

        sqlx::query(
            "INSERT INTO messages (conversation_id, sender_id, body, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(body)
        .bind(&stamp)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Message {
            sender: sender_id.to_string(),
            body: body.to_string(),
            created_at: now,
        })
    }

    /// Only updates the deadline; used when a thread is reopened without a message.
    pub async fn set_conversation_expiry(
        &self,
        conversation_id: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE conversations SET expires_at = ?, updated_at = ? WHERE id = ?")
            .bind(expires_at.as_ref().map(format_timestamp))
            .bind(format_timestamp(&Utc::now()))
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete every conversation whose deadline is at or before `now`.
    /// Messages go with them through the foreign-key cascade.
    pub async fn delete_expired_conversations(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM conversations WHERE expires_at IS NOT NULL AND expires_at <= ?",
        )
        .bind(format_timestamp(&now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query(
            "SELECT sender_id, body, created_at FROM messages WHERE conversation_id = ? ORDER BY id",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let created_at: String = row.get("created_at");
                Message {
                    sender: row.get("sender_id"),
                    body: row.get("body"),
                    created_at: parse_timestamp(&created_at),
                }
            })
            .collect())
    }
}

fn conversation_from_row(row: &sqlx::sqlite::SqliteRow) -> Conversation {
    let expires_at: Option<String> = row.get("expires_at");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Conversation {
        id: row.get("id"),
        participants: [row.get("participant_a"), row.get("participant_b")],
        service_request: row.get("service_request_id"),
        messages: Vec::new(),
        expires_at: expires_at.as_deref().map(parse_timestamp),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    }
}
