#![cfg(feature = "db-tests")]

use sqlx::PgPool;
use vestige::application::repos::{RepoError, TraceRepo};
use vestige::domain::entities::PhantomFrame;
use vestige::domain::traces::{NewGameObject, NewMessage, NewPhantom, NewTraceBundle};
use vestige::infra::db::PostgresRepositories;

fn phantom(owner: &str) -> NewPhantom {
    NewPhantom {
        u_uuid: owner.to_string(),
        data: vec![
            PhantomFrame::new("0,0,0", "0,0,0"),
            PhantomFrame::new("0,1,0", "0,90,0"),
        ],
    }
}

fn object(owner: &str, o_type: i32) -> NewGameObject {
    NewGameObject {
        u_uuid: owner.to_string(),
        o_type,
        o_pos: format!("{o_type},0,0"),
        o_rot: "0,0,0".to_string(),
    }
}

fn message(owner: &str, part1: &str) -> NewMessage {
    NewMessage {
        u_uuid: owner.to_string(),
        part1: part1.to_string(),
        part2: "below".to_string(),
        part3: String::new(),
    }
}

async fn row_count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .expect("count rows")
}

#[sqlx::test(migrations = "./migrations")]
async fn insert_bundle_assigns_ids(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);

    let both = repo
        .insert_bundle(&NewTraceBundle {
            object: Some(object("u1", 1)),
            message: Some(message("u1", "beware")),
            phantom: phantom("u1"),
        })
        .await
        .expect("insert bundle");
    assert!(both.object_id.is_some());
    assert!(both.message_id.is_some());

    let message_only = repo
        .insert_bundle(&NewTraceBundle {
            object: None,
            message: Some(message("u2", "treasure")),
            phantom: phantom("u2"),
        })
        .await
        .expect("insert bundle");
    assert_eq!(message_only.object_id, None);
    assert!(message_only.phantom_id > both.phantom_id);
}

#[sqlx::test(migrations = "./migrations")]
async fn latest_rows_are_newest_first_and_bounded(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);

    for i in 0..5 {
        repo.insert_bundle(&NewTraceBundle {
            object: Some(object("u1", i)),
            message: None,
            phantom: phantom("u1"),
        })
        .await
        .expect("insert bundle");
    }

    let objects = repo.latest_objects(3).await.expect("latest objects");
    assert_eq!(objects.len(), 3);
    assert_eq!(
        objects.iter().map(|row| row.o_type).collect::<Vec<_>>(),
        vec![4, 3, 2]
    );

    let phantoms = repo.latest_phantoms(10).await.expect("latest phantoms");
    assert_eq!(phantoms.len(), 5);
    assert_eq!(phantoms[0].data, phantom("u1").data);
    assert!(phantoms.windows(2).all(|pair| pair[0].id > pair[1].id));

    let messages = repo.latest_messages(10).await.expect("latest messages");
    assert!(messages.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn failed_phantom_insert_rolls_back_the_bundle(pool: PgPool) {
    let repo = PostgresRepositories::new(pool.clone());

    let err = repo
        .insert_bundle(&NewTraceBundle {
            object: Some(object("u1", 9)),
            message: Some(message("u1", "lost")),
            phantom: NewPhantom {
                u_uuid: "u1".to_string(),
                data: Vec::new(),
            },
        })
        .await
        .expect_err("empty phantom violates the check constraint");
    assert!(matches!(err, RepoError::Integrity { .. }), "{err:?}");

    assert_eq!(row_count(&pool, "game_objects").await, 0);
    assert_eq!(row_count(&pool, "messages").await, 0);
    assert_eq!(row_count(&pool, "phantoms").await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn ping_reaches_the_database(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);
    repo.ping().await.expect("ping");
}
