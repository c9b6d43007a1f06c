use super::finish;
use crate::error::RepoError;
use crate::models::{Actor, ActorSearch, ActorUpdate, ActorWithFilms, NewActor, PAGE_LIMIT};
use crate::repository::RepositoryState;

/// ActorService
///
/// Actor writes, and reads that return each actor with its filmography.
#[derive(Clone)]
pub struct ActorService {
    repo: RepositoryState,
}

impl ActorService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub async fn create_actor(&self, actor: &NewActor) -> Result<i32, RepoError> {
        let mut tx = self.repo.begin().await?;
        let result = tx.create_actor(actor).await;
        finish(tx, result).await
    }

    pub async fn update_actor(&self, id: i32, update: &ActorUpdate) -> Result<(), RepoError> {
        let mut tx = self.repo.begin().await?;
        let result = tx.update_actor(id, update).await;
        finish(tx, result).await
    }

    pub async fn delete_actor(&self, id: i32) -> Result<(), RepoError> {
        let mut tx = self.repo.begin().await?;
        let result = tx.delete_actor(id).await;
        finish(tx, result).await
    }

    /// Exact `(name, surname)` lookup, used to resolve cast members.
    pub async fn actor_id(&self, name: &str, surname: &str) -> Result<i32, RepoError> {
        self.repo.actor_id(name, surname).await
    }

    pub async fn get_actor(&self, id: i32) -> Result<ActorWithFilms, RepoError> {
        let actor = self.repo.get_actor(id).await?;
        let films = self.repo.films_with_actor(actor.id).await?;
        Ok(ActorWithFilms { actor, films })
    }

    pub async fn get_actors_list(&self, page: i64) -> Result<Vec<ActorWithFilms>, RepoError> {
        let actors = self.repo.list_actors(page, PAGE_LIMIT).await?;
        self.with_films(actors).await
    }

    pub async fn search_actor(
        &self,
        search: &ActorSearch,
        page: i64,
    ) -> Result<Vec<ActorWithFilms>, RepoError> {
        let actors = self.repo.search_actors(search, page, PAGE_LIMIT).await?;
        self.with_films(actors).await
    }

    // One lookup per actor, in the order the listing returned them.
    async fn with_films(&self, actors: Vec<Actor>) -> Result<Vec<ActorWithFilms>, RepoError> {
        let mut out = Vec::with_capacity(actors.len());
        for actor in actors {
            let films = self.repo.films_with_actor(actor.id).await?;
            out.push(ActorWithFilms { actor, films });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sex;
    use crate::repository::MemoryRepository;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn actor(name: &str, surname: &str) -> NewActor {
        NewActor {
            name: name.into(),
            surname: surname.into(),
            sex: Sex::Male,
            birthday: NaiveDate::from_ymd_opt(1977, 9, 15).unwrap(),
        }
    }

    fn service() -> (MemoryRepository, ActorService) {
        let repo = MemoryRepository::new();
        (repo.clone(), ActorService::new(Arc::new(repo)))
    }

    #[tokio::test]
    async fn list_pages_hold_ten_actors_in_order() {
        let (_, service) = service();
        for i in 0..12 {
            service
                .create_actor(&actor(&format!("name{i}"), "surname"))
                .await
                .unwrap();
        }

        let first = service.get_actors_list(1).await.unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first[0].actor.name, "name0");
        assert_eq!(first[9].actor.name, "name9");

        let second = service.get_actors_list(2).await.unwrap();
        assert_eq!(second.len(), 2);
        assert!(service.get_actors_list(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let (_, service) = service();
        let id = service.create_actor(&actor("Tom", "Hardy")).await.unwrap();

        let update = ActorUpdate {
            surname: Some("Hanks".into()),
            ..ActorUpdate::default()
        };
        service.update_actor(id, &update).await.unwrap();

        let stored = service.get_actor(id).await.unwrap().actor;
        assert_eq!(stored.name, "Tom");
        assert_eq!(stored.surname, "Hanks");
    }

    #[tokio::test]
    async fn search_matches_substrings() {
        let (_, service) = service();
        service.create_actor(&actor("Tom", "Hardy")).await.unwrap();
        service.create_actor(&actor("Tom", "Hanks")).await.unwrap();
        service.create_actor(&actor("Emily", "Blunt")).await.unwrap();

        let search = ActorSearch {
            name: None,
            surname: Some("Ha".into()),
        };
        let found = service.search_actor(&search, 1).await.unwrap();
        let surnames: Vec<_> = found.iter().map(|a| a.actor.surname.as_str()).collect();
        assert_eq!(surnames, vec!["Hardy", "Hanks"]);
    }

    #[tokio::test]
    async fn failed_filmography_lookup_fails_the_read() {
        let (repo, service) = service();
        let id = service.create_actor(&actor("Tom", "Hardy")).await.unwrap();
        repo.fail_on("films_with_actor");
        assert!(service.get_actor(id).await.is_err());
    }
}
