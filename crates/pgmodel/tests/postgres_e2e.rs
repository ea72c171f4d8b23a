use pgmodel::prelude::*;

struct E2eFile;

impl Entity for E2eFile {
    const NAME: &'static str = "E2eFile";
    const TABLE: Option<&'static str> = Some("pgmodel_e2e_files");
    const POST_LOAD: Option<PostLoadFn> = Some(|r| {
        let filename = r.get("filename").map(Value::to_text).unwrap_or_default();
        r.virtual_field("display_name", filename.to_uppercase());
    });
}

#[tokio::test]
async fn files_roundtrip() -> OrmResult<()> {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(v) => v,
        Err(_) => {
            eprintln!("DATABASE_URL is not set; skipping files_roundtrip");
            return Ok(());
        }
    };

    let db = pgmodel::connect(&database_url).await?;
    db.connection()
        .batch_execute(
            "DROP TABLE IF EXISTS pgmodel_e2e_files;
             CREATE TABLE pgmodel_e2e_files (
                 id BIGSERIAL PRIMARY KEY,
                 filename TEXT NOT NULL,
                 userid INT NOT NULL,
                 email TEXT UNIQUE,
                 created_at TIMESTAMPTZ NOT NULL DEFAULT now()
             )",
        )
        .await
        .map_err(OrmError::from_db_error)?;

    let mut files = db.model::<E2eFile>().await?;
    assert_eq!(
        files.field_names(),
        ["id", "filename", "userid", "email", "created_at"]
    );

    let id = files
        .insert([
            ("filename", Value::from("a.txt")),
            ("userid", 2.into()),
            ("email", "x@y.com".into()),
        ])
        .await;
    assert_eq!(id, Some(1));

    let hit = files
        .reset()
        .select_first_where([("email", "x@y.com")])
        .execute()
        .await
        .into_one()
        .expect("inserted row");
    assert_eq!(hit.get("filename"), Some(&Value::from("a.txt")));
    assert_eq!(hit.get("display_name"), Some(&Value::from("A.TXT")));
    assert!(matches!(hit.get("created_at"), Some(Value::TimestampTz(_))));

    let dup = files
        .insert([
            ("filename", Value::from("b.txt")),
            ("userid", 3.into()),
            ("email", "x@y.com".into()),
        ])
        .await;
    assert_eq!(dup, None);
    assert!(files.last_error().is_some_and(OrmError::is_unique_violation));
    assert!(files.error().unwrap_or_default().contains("duplicate key"));

    files.insert([("filename", Value::from("c.txt")), ("userid", 7.into())]).await;
    let big = files
        .reset()
        .select_all_where([("userid", "> 2")])
        .with_fields(["filename"])
        .execute()
        .await
        .into_many();
    assert_eq!(big.len(), 1);
    assert_eq!(big[0].get("id"), None);
    assert_eq!(big[0].get("filename"), Some(&Value::from("c.txt")));

    assert!(files.update([("filename", "c.txt")], [("userid", 8)]).await);
    assert!(!files.update([("filename", "missing")], [("userid", 1)]).await);

    let created = files.create().id().and_then(Value::as_i64);
    assert!(created.is_some_and(|n| n > 3));
    files.assign("filename", "d.txt").assign("userid", 1);
    assert!(matches!(files.save().await, Saved::Inserted(_)));

    let rows = files
        .raw_query(
            "SELECT id, filename FROM pgmodel_e2e_files WHERE userid < :limit ORDER BY id",
            [("limit", 3)],
        )
        .await
        .into_many();
    assert_eq!(rows.len(), 2);

    assert!(!files.delete_by_id(9_999).await);
    let first = hit.get("id").cloned().unwrap_or_default();
    assert!(files.delete_by_id(first).await);
    assert!(files.record().iter().all(|(_, v)| v.is_null()));

    db.connection()
        .batch_execute("DROP TABLE pgmodel_e2e_files")
        .await
        .map_err(OrmError::from_db_error)?;
    Ok(())
}
