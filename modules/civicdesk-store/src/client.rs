use bson::doc;
use mongodb::{Client, Database};

/// Thin wrapper around mongodb::Client providing connection setup.
#[derive(Clone)]
pub struct StoreClient {
    pub(crate) db: Database,
}

impl StoreClient {
    /// Connect and ping, so a bad URI fails at startup rather than on the
    /// first query.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, mongodb::error::Error> {
        let client = Client::with_uri_str(uri).await?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(Self {
            db: client.database(db_name),
        })
    }

    /// Get a reference to the underlying mongodb Database.
    pub fn database(&self) -> &Database {
        &self.db
    }
}
