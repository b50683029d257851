use async_trait::async_trait;
use sqlx::types::Json;

use crate::{
    application::repos::{InsertedBundle, RepoError, TraceRepo},
    domain::entities::{GameObjectRecord, MessageRecord, PhantomFrame, PhantomRecord},
    domain::traces::NewTraceBundle,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct GameObjectRow {
    id: i64,
    u_uuid: String,
    o_type: i32,
    o_pos: String,
    o_rot: String,
}

impl From<GameObjectRow> for GameObjectRecord {
    fn from(row: GameObjectRow) -> Self {
        Self {
            id: row.id,
            u_uuid: row.u_uuid,
            o_type: row.o_type,
            o_pos: row.o_pos,
            o_rot: row.o_rot,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    u_uuid: String,
    part1: String,
    part2: String,
    part3: String,
}

impl From<MessageRow> for MessageRecord {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            u_uuid: row.u_uuid,
            part1: row.part1,
            part2: row.part2,
            part3: row.part3,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PhantomRow {
    id: i64,
    u_uuid: String,
    data: Json<Vec<PhantomFrame>>,
}

impl From<PhantomRow> for PhantomRecord {
    fn from(row: PhantomRow) -> Self {
        Self {
            id: row.id,
            u_uuid: row.u_uuid,
            data: row.data.0,
        }
    }
}

fn limit_param(limit: u32) -> i64 {
    i64::from(limit)
}

#[async_trait]
impl TraceRepo for PostgresRepositories {
    async fn insert_bundle(&self, bundle: &NewTraceBundle) -> Result<InsertedBundle, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let object_id = match bundle.object.as_ref() {
            Some(object) => Some(
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO game_objects (u_uuid, o_type, o_pos, o_rot)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id
                    "#,
                )
                .bind(&object.u_uuid)
                .bind(object.o_type)
                .bind(&object.o_pos)
                .bind(&object.o_rot)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_sqlx_error)?,
            ),
            None => None,
        };

        let message_id = match bundle.message.as_ref() {
            Some(message) => Some(
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO messages (u_uuid, part1, part2, part3)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id
                    "#,
                )
                .bind(&message.u_uuid)
                .bind(&message.part1)
                .bind(&message.part2)
                .bind(&message.part3)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_sqlx_error)?,
            ),
            None => None,
        };

        let phantom_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO phantoms (u_uuid, data)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(&bundle.phantom.u_uuid)
        .bind(Json(&bundle.phantom.data))
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(InsertedBundle {
            object_id,
            message_id,
            phantom_id,
        })
    }

    async fn latest_objects(&self, limit: u32) -> Result<Vec<GameObjectRecord>, RepoError> {
        let rows = sqlx::query_as::<_, GameObjectRow>(
            r#"
            SELECT id, u_uuid, o_type, o_pos, o_rot
            FROM game_objects
            ORDER BY id DESC
            LIMIT $1
            "#,
        )
        .bind(limit_param(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(GameObjectRecord::from).collect())
    }

    async fn latest_messages(&self, limit: u32) -> Result<Vec<MessageRecord>, RepoError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, u_uuid, part1, part2, part3
            FROM messages
            ORDER BY id DESC
            LIMIT $1
            "#,
        )
        .bind(limit_param(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(MessageRecord::from).collect())
    }

    async fn latest_phantoms(&self, limit: u32) -> Result<Vec<PhantomRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PhantomRow>(
            r#"
            SELECT id, u_uuid, data
            FROM phantoms
            ORDER BY id DESC
            LIMIT $1
            "#,
        )
        .bind(limit_param(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PhantomRecord::from).collect())
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}
