//! CLI subcommands.

pub mod migrate;
pub mod seed;
pub mod token;

use secrecy::SecretString;

/// Missing configuration shared by the database commands.
#[derive(Debug, thiserror::Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVar(pub &'static str);

/// `DATABASE_URL`, loading `.env` first if present.
///
/// # Errors
///
/// Returns `MissingEnvVar` if the variable is not set.
pub fn database_url() -> Result<SecretString, MissingEnvVar> {
    dotenvy::dotenv().ok();

    std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| MissingEnvVar("DATABASE_URL"))
}
