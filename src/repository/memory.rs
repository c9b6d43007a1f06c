use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Repository, Transaction, offset};
use crate::error::RepoError;
use crate::models::{
    Actor, ActorSearch, ActorUpdate, CastMember, Film, FilmUpdate, NewActor, NewFilm, Role,
    SortKey, User,
};

/// Committed contents of the store.
#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<User>,
    actors: Vec<Actor>,
    films: Vec<Film>,
    // (film_id, actor_id), insertion ordered.
    starred: Vec<(i32, i32)>,
}

/// One write, as recorded by a transaction and replayed on commit.
#[derive(Debug, Clone)]
enum Op {
    CreateUser(User),
    UpdateUserRole { login: String, role: Role },
    DeleteUser(i32),
    CreateActor(Actor),
    UpdateActor(i32, ActorUpdate),
    DeleteActor(i32),
    CreateFilm(Film),
    AddCastMember { film_id: i32, actor_id: i32 },
    UpdateFilm(i32, FilmUpdate),
    ReplaceCast { film_id: i32, actor_ids: Vec<i32> },
    DeleteFilm(i32),
}

impl Tables {
    fn cast_of(&self, film_id: i32) -> impl Iterator<Item = &Actor> {
        let mut ids: Vec<i32> = self
            .starred
            .iter()
            .filter(|(film, _)| *film == film_id)
            .map(|(_, actor)| *actor)
            .collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(move |id| self.actors.iter().find(|actor| actor.id == id))
    }

    fn has_film(&self, id: i32) -> bool {
        self.films.iter().any(|film| film.id == id)
    }

    fn has_actor(&self, id: i32) -> bool {
        self.actors.iter().any(|actor| actor.id == id)
    }

    /// Applies `op` with the same checks the database schema enforces.
    fn apply(&mut self, op: &Op) -> Result<(), RepoError> {
        match op {
            Op::CreateUser(user) => {
                if self.users.iter().any(|existing| existing.login == user.login) {
                    return Err(RepoError::Conflict(format!("user {}", user.login)));
                }
                self.users.push(user.clone());
            }
            Op::UpdateUserRole { login, role } => {
                let user = self
                    .users
                    .iter_mut()
                    .find(|user| user.login == *login)
                    .ok_or(RepoError::not_found("user"))?;
                user.user_role = *role;
            }
            Op::DeleteUser(id) => {
                let before = self.users.len();
                self.users.retain(|user| user.id != *id);
                if self.users.len() == before {
                    return Err(RepoError::not_found("user"));
                }
            }
            Op::CreateActor(actor) => self.actors.push(actor.clone()),
            Op::UpdateActor(id, update) => {
                let actor = self
                    .actors
                    .iter_mut()
                    .find(|actor| actor.id == *id)
                    .ok_or(RepoError::not_found("actor"))?;
                if let Some(name) = &update.name {
                    actor.name = name.clone();
                }
                if let Some(surname) = &update.surname {
                    actor.surname = surname.clone();
                }
                if let Some(sex) = update.sex {
                    actor.sex = sex;
                }
                if let Some(birthday) = update.birthday {
                    actor.birthday = birthday;
                }
            }
            Op::DeleteActor(id) => {
                let before = self.actors.len();
                self.actors.retain(|actor| actor.id != *id);
                if self.actors.len() == before {
                    return Err(RepoError::not_found("actor"));
                }
                self.starred.retain(|(_, actor)| actor != id);
            }
            Op::CreateFilm(film) => self.films.push(film.clone()),
            Op::AddCastMember { film_id, actor_id } => {
                if !self.has_film(*film_id) {
                    return Err(RepoError::not_found("film"));
                }
                if !self.has_actor(*actor_id) {
                    return Err(RepoError::not_found("actor"));
                }
                if !self.starred.contains(&(*film_id, *actor_id)) {
                    self.starred.push((*film_id, *actor_id));
                }
            }
            Op::UpdateFilm(id, update) => {
                let film = self
                    .films
                    .iter_mut()
                    .find(|film| film.id == *id)
                    .ok_or(RepoError::not_found("film"))?;
                if let Some(title) = &update.title {
                    film.title = title.clone();
                }
                if let Some(description) = &update.description {
                    film.description = description.clone();
                }
                if let Some(issue_date) = update.issue_date {
                    film.issue_date = issue_date;
                }
                if let Some(rating) = update.rating {
                    film.rating = rating;
                }
            }
            Op::ReplaceCast { film_id, actor_ids } => {
                if !self.has_film(*film_id) {
                    return Err(RepoError::not_found("film"));
                }
                if actor_ids.iter().any(|id| !self.has_actor(*id)) {
                    return Err(RepoError::not_found("actor"));
                }
                self.starred
                    .retain(|(film, actor)| film != film_id || actor_ids.contains(actor));
                for &actor_id in actor_ids {
                    if !self.starred.contains(&(*film_id, actor_id)) {
                        self.starred.push((*film_id, actor_id));
                    }
                }
            }
            Op::DeleteFilm(id) => {
                let before = self.films.len();
                self.films.retain(|film| film.id != *id);
                if self.films.len() == before {
                    return Err(RepoError::not_found("film"));
                }
                self.starred.retain(|(film, _)| film != id);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    failing: Mutex<HashSet<String>>,
    open: AtomicUsize,
    // Ids are handed out at write time and never reused, like Postgres
    // sequences, so overlapping transactions cannot collide.
    next_user: AtomicI32,
    next_actor: AtomicI32,
    next_film: AtomicI32,
}

impl Shared {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, operation: &str) -> Result<(), RepoError> {
        let failing = self.failing.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if failing.contains(operation) {
            Err(RepoError::Injected(operation.to_string()))
        } else {
            Ok(())
        }
    }
}

fn next_id(counter: &AtomicI32) -> i32 {
    counter.fetch_add(1, Ordering::SeqCst) + 1
}

/// MemoryRepository
///
/// In-process implementation of the persistence interface used by the test
/// suite and for running the service without a database.
///
/// A transaction applies its writes to a private snapshot and records them.
/// Commit replays the recorded writes against the tables as they are at that
/// moment, so transactions that overlap all keep their effects; a write that
/// no longer applies (its row was deleted meanwhile, or a login was taken)
/// fails the commit and leaves the tables untouched. Any operation can be made to fail by name with `fail_on`, and
/// `open_transactions` reports how many transactions are still unfinished.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    shared: Arc<Shared>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call of `operation` (a trait method name) fail.
    pub fn fail_on(&self, operation: &str) {
        self.shared
            .failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(operation.to_string());
    }

    pub fn clear_failures(&self) {
        self.shared
            .failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub fn open_transactions(&self) -> usize {
        self.shared.open.load(Ordering::SeqCst)
    }

    pub fn film_count(&self) -> usize {
        self.shared.tables().films.len()
    }

    pub fn cast_links(&self) -> Vec<(i32, i32)> {
        self.shared.tables().starred.clone()
    }

    pub fn user_by_login(&self, login: &str) -> Option<User> {
        self.shared
            .tables()
            .users
            .iter()
            .find(|user| user.login == login)
            .cloned()
    }
}

fn page_of<T: Clone>(rows: Vec<&T>, page: i64, limit: i64) -> Vec<T> {
    rows.into_iter()
        .skip(offset(page, limit) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect()
}

fn contains(haystack: &str, needle: Option<&str>) -> bool {
    needle.is_none_or(|needle| haystack.contains(needle))
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn begin(&self) -> Result<Box<dyn Transaction>, RepoError> {
        self.shared.check("begin")?;
        let snapshot = self.shared.tables().clone();
        self.shared.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryTransaction {
            shared: self.shared.clone(),
            pending: Some(Pending {
                working: snapshot,
                log: Vec::new(),
            }),
        }))
    }

    async fn find_user(&self, login: &str, password_hash: &str) -> Result<User, RepoError> {
        self.shared.check("find_user")?;
        self.shared
            .tables()
            .users
            .iter()
            .find(|user| user.login == login && user.password == password_hash)
            .cloned()
            .ok_or(RepoError::not_found("user"))
    }

    async fn user_role(&self, id: i32) -> Result<Role, RepoError> {
        self.shared.check("user_role")?;
        self.shared
            .tables()
            .users
            .iter()
            .find(|user| user.id == id)
            .map(|user| user.user_role)
            .ok_or(RepoError::not_found("user"))
    }

    async fn actor_id(&self, name: &str, surname: &str) -> Result<i32, RepoError> {
        self.shared.check("actor_id")?;
        self.shared
            .tables()
            .actors
            .iter()
            .find(|actor| actor.name == name && actor.surname == surname)
            .map(|actor| actor.id)
            .ok_or(RepoError::not_found("actor"))
    }

    async fn get_actor(&self, id: i32) -> Result<Actor, RepoError> {
        self.shared.check("get_actor")?;
        self.shared
            .tables()
            .actors
            .iter()
            .find(|actor| actor.id == id)
            .cloned()
            .ok_or(RepoError::not_found("actor"))
    }

    async fn list_actors(&self, page: i64, limit: i64) -> Result<Vec<Actor>, RepoError> {
        self.shared.check("list_actors")?;
        let tables = self.shared.tables();
        Ok(page_of(tables.actors.iter().collect(), page, limit))
    }

    async fn search_actors(
        &self,
        search: &ActorSearch,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Actor>, RepoError> {
        self.shared.check("search_actors")?;
        let tables = self.shared.tables();
        let rows: Vec<&Actor> = tables
            .actors
            .iter()
            .filter(|actor| {
                contains(&actor.name, search.name.as_deref())
                    && contains(&actor.surname, search.surname.as_deref())
            })
            .collect();
        Ok(page_of(rows, page, limit))
    }

    async fn films_with_actor(&self, actor_id: i32) -> Result<Vec<Film>, RepoError> {
        self.shared.check("films_with_actor")?;
        let tables = self.shared.tables();
        Ok(tables
            .films
            .iter()
            .filter(|film| tables.starred.contains(&(film.id, actor_id)))
            .cloned()
            .collect())
    }

    async fn get_film(&self, id: i32) -> Result<Film, RepoError> {
        self.shared.check("get_film")?;
        self.shared
            .tables()
            .films
            .iter()
            .find(|film| film.id == id)
            .cloned()
            .ok_or(RepoError::not_found("film"))
    }

    async fn sorted_films(
        &self,
        sort: SortKey,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Film>, RepoError> {
        self.shared.check("sorted_films")?;
        let tables = self.shared.tables();
        let mut rows: Vec<&Film> = tables.films.iter().collect();
        // Descending by key, ascending id on ties.
        rows.sort_by(|a, b| {
            let by_key = match sort {
                SortKey::Title => b.title.cmp(&a.title),
                SortKey::Rating => b.rating.cmp(&a.rating),
                SortKey::IssueDate => b.issue_date.cmp(&a.issue_date),
            };
            by_key.then(a.id.cmp(&b.id))
        });
        Ok(page_of(rows, page, limit))
    }

    async fn films_by_title(
        &self,
        title: &str,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Film>, RepoError> {
        self.shared.check("films_by_title")?;
        let tables = self.shared.tables();
        let rows: Vec<&Film> = tables
            .films
            .iter()
            .filter(|film| film.title.contains(title))
            .collect();
        Ok(page_of(rows, page, limit))
    }

    async fn films_by_cast(
        &self,
        title: Option<&str>,
        name: Option<&str>,
        surname: Option<&str>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Film>, RepoError> {
        self.shared.check("films_by_cast")?;
        let tables = self.shared.tables();
        let rows: Vec<&Film> = tables
            .films
            .iter()
            .filter(|film| contains(&film.title, title))
            .filter(|film| {
                tables.cast_of(film.id).any(|actor| {
                    contains(&actor.name, name) && contains(&actor.surname, surname)
                })
            })
            .collect();
        Ok(page_of(rows, page, limit))
    }

    async fn film_cast(&self, film_id: i32) -> Result<Vec<CastMember>, RepoError> {
        self.shared.check("film_cast")?;
        let tables = self.shared.tables();
        Ok(tables
            .cast_of(film_id)
            .map(|actor| CastMember {
                name: actor.name.clone(),
                surname: actor.surname.clone(),
            })
            .collect())
    }
}

/// Uncommitted state of a transaction.
struct Pending {
    working: Tables,
    log: Vec<Op>,
}

/// MemoryTransaction
///
/// `None` once committed or rolled back.
pub struct MemoryTransaction {
    shared: Arc<Shared>,
    pending: Option<Pending>,
}

impl MemoryTransaction {
    fn writable(&self, operation: &str) -> Result<(), RepoError> {
        self.shared.check(operation)?;
        if self.pending.is_none() {
            return Err(RepoError::Finished);
        }
        Ok(())
    }

    fn record(&mut self, op: Op) -> Result<(), RepoError> {
        let pending = self.pending.as_mut().ok_or(RepoError::Finished)?;
        pending.working.apply(&op)?;
        pending.log.push(op);
        Ok(())
    }

    fn finish(&mut self) -> Option<Pending> {
        let pending = self.pending.take();
        if pending.is_some() {
            self.shared.open.fetch_sub(1, Ordering::SeqCst);
        }
        pending
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.finish();
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn create_user(
        &mut self,
        login: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<i32, RepoError> {
        self.writable("create_user")?;
        let id = next_id(&self.shared.next_user);
        self.record(Op::CreateUser(User {
            id,
            login: login.to_string(),
            password: password_hash.to_string(),
            user_role: role,
        }))?;
        Ok(id)
    }

    async fn update_user_role(&mut self, login: &str, role: Role) -> Result<(), RepoError> {
        self.writable("update_user_role")?;
        self.record(Op::UpdateUserRole {
            login: login.to_string(),
            role,
        })
    }

    async fn delete_user(&mut self, id: i32) -> Result<(), RepoError> {
        self.writable("delete_user")?;
        self.record(Op::DeleteUser(id))
    }

    async fn create_actor(&mut self, actor: &NewActor) -> Result<i32, RepoError> {
        self.writable("create_actor")?;
        let id = next_id(&self.shared.next_actor);
        self.record(Op::CreateActor(Actor {
            id,
            name: actor.name.clone(),
            surname: actor.surname.clone(),
            sex: actor.sex,
            birthday: actor.birthday,
        }))?;
        Ok(id)
    }

    async fn update_actor(&mut self, id: i32, update: &ActorUpdate) -> Result<(), RepoError> {
        self.writable("update_actor")?;
        self.record(Op::UpdateActor(id, update.clone()))
    }

    async fn delete_actor(&mut self, id: i32) -> Result<(), RepoError> {
        self.writable("delete_actor")?;
        self.record(Op::DeleteActor(id))
    }

    async fn create_film(&mut self, film: &NewFilm) -> Result<i32, RepoError> {
        self.writable("create_film")?;
        let id = next_id(&self.shared.next_film);
        self.record(Op::CreateFilm(Film {
            id,
            title: film.title.clone(),
            description: film.description.clone(),
            issue_date: film.issue_date,
            rating: film.rating,
        }))?;
        Ok(id)
    }

    async fn add_cast_member(&mut self, film_id: i32, actor_id: i32) -> Result<(), RepoError> {
        self.writable("add_cast_member")?;
        self.record(Op::AddCastMember { film_id, actor_id })
    }

    async fn update_film(&mut self, id: i32, update: &FilmUpdate) -> Result<(), RepoError> {
        self.writable("update_film")?;
        self.record(Op::UpdateFilm(id, update.clone()))
    }

    async fn replace_cast(&mut self, film_id: i32, actor_ids: &[i32]) -> Result<(), RepoError> {
        self.writable("replace_cast")?;
        self.record(Op::ReplaceCast {
            film_id,
            actor_ids: actor_ids.to_vec(),
        })
    }

    async fn delete_film(&mut self, id: i32) -> Result<(), RepoError> {
        self.writable("delete_film")?;
        self.record(Op::DeleteFilm(id))
    }

    async fn commit(&mut self) -> Result<(), RepoError> {
        if self.pending.is_none() {
            return Err(RepoError::Finished);
        }
        // A failed commit still ends the transaction, as in Postgres.
        let injected = self.shared.check("commit");
        let Some(pending) = self.finish() else {
            return Err(RepoError::Finished);
        };
        injected?;
        if pending.log.is_empty() {
            return Ok(());
        }

        let mut tables = self.shared.tables();
        let mut next = tables.clone();
        for op in &pending.log {
            next.apply(op)?;
        }
        *tables = next;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), RepoError> {
        self.shared.check("rollback")?;
        self.finish();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn film(title: &str, rating: i32) -> NewFilm {
        NewFilm {
            title: title.into(),
            description: String::new(),
            issue_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            rating,
            cast: vec![],
        }
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() {
        let repo = MemoryRepository::new();
        let mut tx = repo.begin().await.unwrap();
        let id = tx.create_film(&film("Heat", 8)).await.unwrap();

        assert!(repo.get_film(id).await.is_err());
        assert_eq!(repo.open_transactions(), 1);

        tx.commit().await.unwrap();
        assert_eq!(repo.get_film(id).await.unwrap().title, "Heat");
        assert_eq!(repo.open_transactions(), 0);
    }

    #[tokio::test]
    async fn dropped_transaction_is_discarded() {
        let repo = MemoryRepository::new();
        {
            let mut tx = repo.begin().await.unwrap();
            tx.create_film(&film("Heat", 8)).await.unwrap();
        }
        assert_eq!(repo.film_count(), 0);
        assert_eq!(repo.open_transactions(), 0);
    }

    #[tokio::test]
    async fn finished_transaction_rejects_writes() {
        let repo = MemoryRepository::new();
        let mut tx = repo.begin().await.unwrap();
        tx.rollback().await.unwrap();
        assert!(matches!(
            tx.create_film(&film("Heat", 8)).await,
            Err(RepoError::Finished)
        ));
        assert!(matches!(tx.commit().await, Err(RepoError::Finished)));
    }

    #[tokio::test]
    async fn sorted_films_are_descending() {
        let repo = MemoryRepository::new();
        let mut tx = repo.begin().await.unwrap();
        tx.create_film(&film("b", 3)).await.unwrap();
        tx.create_film(&film("a", 9)).await.unwrap();
        tx.create_film(&film("c", 5)).await.unwrap();
        tx.commit().await.unwrap();

        let by_rating: Vec<i32> = repo
            .sorted_films(SortKey::Rating, 1, 10)
            .await
            .unwrap()
            .iter()
            .map(|film| film.rating)
            .collect();
        assert_eq!(by_rating, vec![9, 5, 3]);

        let by_title: Vec<String> = repo
            .sorted_films(SortKey::Title, 1, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|film| film.title)
            .collect();
        assert_eq!(by_title, vec!["c", "b", "a"]);
    }

    fn actor(name: &str) -> NewActor {
        NewActor {
            name: name.into(),
            surname: "Smith".into(),
            sex: crate::models::Sex::Female,
            birthday: NaiveDate::from_ymd_opt(1980, 1, 1).unwrap(),
        }
    }

    #[tokio::test]
    async fn overlapping_commits_keep_both_writes() {
        let repo = MemoryRepository::new();
        let mut first = repo.begin().await.unwrap();
        let mut second = repo.begin().await.unwrap();

        let a = first.create_actor(&actor("A")).await.unwrap();
        let b = second.create_actor(&actor("B")).await.unwrap();
        assert_ne!(a, b);

        first.commit().await.unwrap();
        second.commit().await.unwrap();

        let names: Vec<String> = repo
            .list_actors(1, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|actor| actor.name)
            .collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(repo.get_actor(a).await.unwrap().name, "A");
        assert_eq!(repo.get_actor(b).await.unwrap().name, "B");
    }

    #[tokio::test]
    async fn commit_fails_when_a_concurrent_delete_removed_its_row() {
        let repo = MemoryRepository::new();
        let mut setup = repo.begin().await.unwrap();
        let film_id = setup.create_film(&film("Heat", 8)).await.unwrap();
        let actor_id = setup.create_actor(&actor("A")).await.unwrap();
        setup.commit().await.unwrap();

        let mut linker = repo.begin().await.unwrap();
        linker.add_cast_member(film_id, actor_id).await.unwrap();

        let mut deleter = repo.begin().await.unwrap();
        deleter.delete_actor(actor_id).await.unwrap();
        deleter.commit().await.unwrap();

        assert!(matches!(
            linker.commit().await,
            Err(RepoError::NotFound { entity: "actor" })
        ));
        assert!(repo.cast_links().is_empty());
        assert_eq!(repo.film_count(), 1);
        assert_eq!(repo.open_transactions(), 0);
    }

    #[tokio::test]
    async fn overlapping_registrations_of_one_login_conflict() {
        let repo = MemoryRepository::new();
        let mut first = repo.begin().await.unwrap();
        let mut second = repo.begin().await.unwrap();
        first.create_user("neo", "h1", Role::Regular).await.unwrap();
        second.create_user("neo", "h2", Role::Admin).await.unwrap();

        first.commit().await.unwrap();
        assert!(matches!(second.commit().await, Err(RepoError::Conflict(_))));
        assert_eq!(repo.user_by_login("neo").unwrap().password, "h1");
    }

    #[tokio::test]
    async fn rolled_back_ids_are_not_reused() {
        let repo = MemoryRepository::new();
        let mut tx = repo.begin().await.unwrap();
        let discarded = tx.create_film(&film("Heat", 8)).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = repo.begin().await.unwrap();
        let kept = tx.create_film(&film("Ronin", 7)).await.unwrap();
        tx.commit().await.unwrap();
        assert!(kept > discarded);
    }

    #[tokio::test]
    async fn injected_failure_names_the_operation() {
        let repo = MemoryRepository::new();
        repo.fail_on("get_film");
        let err = repo.get_film(1).await.unwrap_err();
        assert_eq!(err.to_string(), "get_film failed");

        repo.clear_failures();
        assert!(matches!(
            repo.get_film(1).await,
            Err(RepoError::NotFound { entity: "film" })
        ));
    }
}
