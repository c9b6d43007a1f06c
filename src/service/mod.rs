//! Entity services.
//!
//! Each service composes repository calls into one atomic operation. Every
//! mutating operation follows the same shape:
//!
//! ```text
//! let mut tx = repo.begin().await?;
//! let result = async { /* writes through tx, in order */ }.await;
//! finish(tx, result).await
//! ```
//!
//! so no service method returns with its transaction still open.

use tracing::warn;

use crate::config::AppConfig;
use crate::error::RepoError;
use crate::repository::{RepositoryState, Transaction};

pub mod actor;
pub mod film;
pub mod user;

pub use actor::ActorService;
pub use film::FilmService;
pub use user::UserService;

/// Services
///
/// The three entity services built over one shared repository.
#[derive(Clone)]
pub struct Services {
    pub users: UserService,
    pub actors: ActorService,
    pub films: FilmService,
}

impl Services {
    pub fn new(repo: RepositoryState, config: &AppConfig) -> Self {
        let actors = ActorService::new(repo.clone());
        Self {
            users: UserService::new(repo.clone(), config),
            films: FilmService::new(repo, actors.clone()),
            actors,
        }
    }
}

/// Commits on success. On failure, or when the commit itself fails, rolls
/// back and returns the original error, joined with the rollback error if
/// that fails too.
pub(crate) async fn finish<T>(
    mut tx: Box<dyn Transaction>,
    result: Result<T, RepoError>,
) -> Result<T, RepoError> {
    let err = match result {
        Ok(value) => match tx.commit().await {
            Ok(()) => return Ok(value),
            Err(err) => err,
        },
        Err(err) => err,
    };
    Err(abort(tx, err).await)
}

async fn abort(mut tx: Box<dyn Transaction>, err: RepoError) -> RepoError {
    match tx.rollback().await {
        Ok(()) => err,
        Err(rollback) => {
            warn!(error = %rollback, "rollback failed");
            RepoError::Rollback {
                original: Box::new(err),
                rollback: Box::new(rollback),
            }
        }
    }
}
