use async_trait::async_trait;
use std::sync::Arc;

use crate::error::RepoError;
use crate::models::{
    Actor, ActorSearch, ActorUpdate, CastMember, Film, FilmUpdate, NewActor, NewFilm, Role,
    SortKey, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// Repository Trait
///
/// Defines the abstract contract for all read operations, plus `begin`, the
/// entry point to every write. Handlers never see it directly: the services
/// compose these calls into atomic operations.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable across request tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Opens a transaction owned exclusively by the caller until it commits or
    /// rolls back.
    async fn begin(&self) -> Result<Box<dyn Transaction>, RepoError>;

    // --- Users ---
    // Matches both the login and the stored password hash.
    async fn find_user(&self, login: &str, password_hash: &str) -> Result<User, RepoError>;
    async fn user_role(&self, id: i32) -> Result<Role, RepoError>;

    // --- Actors ---
    async fn actor_id(&self, name: &str, surname: &str) -> Result<i32, RepoError>;
    async fn get_actor(&self, id: i32) -> Result<Actor, RepoError>;
    async fn list_actors(&self, page: i64, limit: i64) -> Result<Vec<Actor>, RepoError>;
    async fn search_actors(
        &self,
        search: &ActorSearch,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Actor>, RepoError>;
    async fn films_with_actor(&self, actor_id: i32) -> Result<Vec<Film>, RepoError>;

    // --- Films ---
    async fn get_film(&self, id: i32) -> Result<Film, RepoError>;
    async fn sorted_films(
        &self,
        sort: SortKey,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Film>, RepoError>;
    async fn films_by_title(&self, title: &str, page: i64, limit: i64)
    -> Result<Vec<Film>, RepoError>;
    // Any absent filter is ignored; present ones are combined with AND.
    async fn films_by_cast(
        &self,
        title: Option<&str>,
        name: Option<&str>,
        surname: Option<&str>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Film>, RepoError>;
    async fn film_cast(&self, film_id: i32) -> Result<Vec<CastMember>, RepoError>;
}

/// Transaction Trait
///
/// Every write the services perform goes through an open transaction.
/// `commit` and `rollback` finish it; any later write or commit fails with
/// `RepoError::Finished`, while a later rollback is a no-op. Dropping an
/// unfinished transaction discards its writes.
#[async_trait]
pub trait Transaction: Send {
    // --- Users ---
    async fn create_user(
        &mut self,
        login: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<i32, RepoError>;
    async fn update_user_role(&mut self, login: &str, role: Role) -> Result<(), RepoError>;
    async fn delete_user(&mut self, id: i32) -> Result<(), RepoError>;

    // --- Actors ---
    async fn create_actor(&mut self, actor: &NewActor) -> Result<i32, RepoError>;
    async fn update_actor(&mut self, id: i32, update: &ActorUpdate) -> Result<(), RepoError>;
    // Cast links of the actor go with it.
    async fn delete_actor(&mut self, id: i32) -> Result<(), RepoError>;

    // --- Films ---
    async fn create_film(&mut self, film: &NewFilm) -> Result<i32, RepoError>;
    async fn add_cast_member(&mut self, film_id: i32, actor_id: i32) -> Result<(), RepoError>;
    // Scalar fields only; the update must carry at least one.
    async fn update_film(&mut self, id: i32, update: &FilmUpdate) -> Result<(), RepoError>;
    // Leaves exactly `actor_ids` linked to the film.
    async fn replace_cast(&mut self, film_id: i32, actor_ids: &[i32]) -> Result<(), RepoError>;
    async fn delete_film(&mut self, id: i32) -> Result<(), RepoError>;

    async fn commit(&mut self) -> Result<(), RepoError>;
    async fn rollback(&mut self) -> Result<(), RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Zero-based row offset of a one-based page.
pub(crate) fn offset(page: i64, limit: i64) -> i64 {
    (page - 1).max(0) * limit
}

#[cfg(test)]
mod tests {
    use super::offset;

    #[test]
    fn pages_are_one_based() {
        assert_eq!(offset(1, 10), 0);
        assert_eq!(offset(3, 10), 20);
        assert_eq!(offset(0, 10), 0);
    }
}
