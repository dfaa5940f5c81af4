use crate::error::Result;
use crate::{ADMIN_DB_NAME, OPLOG_DB};
use bson::doc;
use mongodb::sync::Client;

/// Database names on `client`, excluding `admin` and `local`.
pub fn list_non_system_databases(client: &Client) -> Result<Vec<String>> {
    let names = client.list_database_names(doc! {}, None)?;
    Ok(names
        .into_iter()
        .filter(|db| db != ADMIN_DB_NAME && db != OPLOG_DB)
        .collect())
}

/// Collection names in `db`.
pub fn list_collections(client: &Client, db: &str) -> Result<Vec<String>> {
    Ok(client.database(db).list_collection_names(doc! {})?)
}
