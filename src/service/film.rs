use tracing::debug;

use super::{ActorService, finish};
use crate::error::RepoError;
use crate::models::{
    CastMember, Film, FilmQuery, FilmSearch, FilmUpdate, FilmWithCast, NewFilm, PAGE_LIMIT,
    SortKey,
};
use crate::repository::RepositoryState;

/// FilmService
///
/// Film writes keep a film and its cast consistent inside one transaction.
/// Cast members are resolved to actor ids through the `ActorService`.
#[derive(Clone)]
pub struct FilmService {
    repo: RepositoryState,
    actors: ActorService,
}

impl FilmService {
    pub fn new(repo: RepositoryState, actors: ActorService) -> Self {
        Self { repo, actors }
    }

    /// Inserts the film, then links each cast member in input order. A member
    /// that does not resolve aborts the whole film.
    pub async fn create_film(&self, film: &NewFilm) -> Result<i32, RepoError> {
        let mut tx = self.repo.begin().await?;
        let result = async {
            let id = tx.create_film(film).await?;
            for member in &film.cast {
                let actor_id = self.actors.actor_id(&member.name, &member.surname).await?;
                tx.add_cast_member(id, actor_id).await?;
            }
            Ok::<_, RepoError>(id)
        }
        .await;
        let id = finish(tx, result).await?;

        debug!(film_id = id, cast = film.cast.len(), "film created");
        Ok(id)
    }

    /// Applies the scalar fields, if any, then replaces the cast with exactly
    /// the given members when a cast is supplied.
    pub async fn update_film(&self, id: i32, update: &FilmUpdate) -> Result<(), RepoError> {
        let mut tx = self.repo.begin().await?;
        let result = async {
            if !update.assignments().is_empty() {
                tx.update_film(id, update).await?;
            }
            if let Some(cast) = &update.cast {
                let actor_ids = self.resolve_cast(cast).await?;
                tx.replace_cast(id, &actor_ids).await?;
            }
            Ok::<_, RepoError>(())
        }
        .await;
        finish(tx, result).await
    }

    async fn resolve_cast(&self, cast: &[CastMember]) -> Result<Vec<i32>, RepoError> {
        let mut ids = Vec::with_capacity(cast.len());
        for member in cast {
            ids.push(self.actors.actor_id(&member.name, &member.surname).await?);
        }
        Ok(ids)
    }

    pub async fn delete_film(&self, id: i32) -> Result<(), RepoError> {
        let mut tx = self.repo.begin().await?;
        let result = tx.delete_film(id).await;
        finish(tx, result).await
    }

    pub async fn get_cur_film(&self, id: i32) -> Result<FilmWithCast, RepoError> {
        let film = self.repo.get_film(id).await?;
        let cast = self.repo.film_cast(film.id).await?;
        Ok(FilmWithCast { film, cast })
    }

    pub async fn get_sorted_film_list(
        &self,
        sort: SortKey,
        page: i64,
    ) -> Result<Vec<FilmWithCast>, RepoError> {
        let films = self.repo.sorted_films(sort, page, PAGE_LIMIT).await?;
        self.with_cast(films).await
    }

    /// Returns `Ok(None)` when the fragment selects no search mode.
    pub async fn get_search_film_list(
        &self,
        search: &FilmSearch,
        page: i64,
    ) -> Result<Option<Vec<FilmWithCast>>, RepoError> {
        let films = match search.mode() {
            Some(FilmQuery::Title(title)) => {
                self.repo.films_by_title(title, page, PAGE_LIMIT).await?
            }
            Some(FilmQuery::Cast {
                title,
                name,
                surname,
            }) => {
                self.repo
                    .films_by_cast(title, name, surname, page, PAGE_LIMIT)
                    .await?
            }
            None => return Ok(None),
        };
        self.with_cast(films).await.map(Some)
    }

    async fn with_cast(&self, films: Vec<Film>) -> Result<Vec<FilmWithCast>, RepoError> {
        let mut out = Vec::with_capacity(films.len());
        for film in films {
            let cast = self.repo.film_cast(film.id).await?;
            out.push(FilmWithCast { film, cast });
        }
        Ok(out)
    }
}
