use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const FALLBACK_DATABASE: &str = "pong";

/// Parsed connection options and the database holding `game_sessions`.
#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
}

impl MongoConfig {
    /// Parse a connection string. The database is `db_name`, else the one named
    /// in the URI, else `pong`.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: redact_uri(uri),
                    source,
                })?;
        let database_name = db_name
            .map(str::to_owned)
            .or_else(|| options.default_database.clone())
            .unwrap_or_else(|| FALLBACK_DATABASE.to_owned());

        Ok(Self {
            options,
            database_name,
        })
    }
}

/// Connection string safe to log: credentials before `@` are masked.
pub fn redact_uri(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_owned();
    };
    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{scheme}://***@{}", &rest[at + 1..]),
        None => uri.to_owned(),
    }
}
