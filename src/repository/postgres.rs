use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use super::{Repository, Transaction, offset};
use crate::error::RepoError;
use crate::models::{
    Actor, ActorSearch, ActorUpdate, CastMember, FieldValue, Film, FilmUpdate, NewActor, NewFilm,
    Role, SortKey, User,
};

const ACTOR_COLUMNS: &str = "id, name, surname, sex, birthday";
const FILM_COLUMNS: &str = "f.id, f.title, f.description, f.issue_date, f.rating";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL database.
/// Every user-supplied value, search substrings included, is bound as a parameter.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends `AND POSITION($n IN column) > 0` for a present fragment.
fn push_contains<'a>(builder: &mut QueryBuilder<'a, Postgres>, column: &str, value: Option<&'a str>) {
    if let Some(value) = value {
        builder.push(" AND POSITION(");
        builder.push_bind(value);
        builder.push(format!(" IN {column}) > 0"));
    }
}

fn push_page(builder: &mut QueryBuilder<'_, Postgres>, page: i64, limit: i64) {
    builder.push(" LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(offset(page, limit));
}

/// Appends `col = $n, ...` for every supplied field of a partial update.
fn push_assignments(builder: &mut QueryBuilder<'_, Postgres>, assignments: Vec<(&'static str, FieldValue)>) {
    let mut set = builder.separated(", ");
    for (column, value) in assignments {
        set.push(format!("{column} = "));
        match value {
            FieldValue::Text(text) => set.push_bind_unseparated(text),
            FieldValue::Date(date) => set.push_bind_unseparated(date),
            FieldValue::Int(int) => set.push_bind_unseparated(int),
        };
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn begin(&self) -> Result<Box<dyn Transaction>, RepoError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx: Some(tx) }))
    }

    async fn find_user(&self, login: &str, password_hash: &str) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(
            "SELECT id, login, password, user_role FROM users WHERE login = $1 AND password = $2",
        )
        .bind(login)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepoError::not_found("user"))
    }

    async fn user_role(&self, id: i32) -> Result<Role, RepoError> {
        let role: Option<String> = sqlx::query_scalar("SELECT user_role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let role = role.ok_or(RepoError::not_found("user"))?;
        Role::try_from(role).map_err(|err| RepoError::Database(sqlx::Error::Decode(err.into())))
    }

    async fn actor_id(&self, name: &str, surname: &str) -> Result<i32, RepoError> {
        sqlx::query_scalar("SELECT id FROM actors WHERE name = $1 AND surname = $2 ORDER BY id LIMIT 1")
            .bind(name)
            .bind(surname)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepoError::not_found("actor"))
    }

    async fn get_actor(&self, id: i32) -> Result<Actor, RepoError> {
        sqlx::query_as::<_, Actor>(&format!("SELECT {ACTOR_COLUMNS} FROM actors WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepoError::not_found("actor"))
    }

    async fn list_actors(&self, page: i64, limit: i64) -> Result<Vec<Actor>, RepoError> {
        let actors = sqlx::query_as::<_, Actor>(&format!(
            "SELECT {ACTOR_COLUMNS} FROM actors ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset(page, limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(actors)
    }

    async fn search_actors(
        &self,
        search: &ActorSearch,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Actor>, RepoError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ACTOR_COLUMNS} FROM actors WHERE TRUE"));
        push_contains(&mut builder, "name", search.name.as_deref());
        push_contains(&mut builder, "surname", search.surname.as_deref());
        builder.push(" ORDER BY id");
        push_page(&mut builder, page, limit);

        let actors = builder.build_query_as::<Actor>().fetch_all(&self.pool).await?;
        Ok(actors)
    }

    async fn films_with_actor(&self, actor_id: i32) -> Result<Vec<Film>, RepoError> {
        let films = sqlx::query_as::<_, Film>(&format!(
            "SELECT {FILM_COLUMNS} FROM films f JOIN starred s ON s.film_id = f.id \
             WHERE s.actor_id = $1 ORDER BY f.id"
        ))
        .bind(actor_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(films)
    }

    async fn get_film(&self, id: i32) -> Result<Film, RepoError> {
        sqlx::query_as::<_, Film>(&format!("SELECT {FILM_COLUMNS} FROM films f WHERE f.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepoError::not_found("film"))
    }

    async fn sorted_films(
        &self,
        sort: SortKey,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Film>, RepoError> {
        // The column comes from a closed enum, never from the request.
        let films = sqlx::query_as::<_, Film>(&format!(
            "SELECT {FILM_COLUMNS} FROM films f ORDER BY f.{} DESC, f.id LIMIT $1 OFFSET $2",
            sort.column()
        ))
        .bind(limit)
        .bind(offset(page, limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(films)
    }

    async fn films_by_title(
        &self,
        title: &str,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Film>, RepoError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {FILM_COLUMNS} FROM films f WHERE TRUE"));
        push_contains(&mut builder, "f.title", Some(title));
        builder.push(" ORDER BY f.id");
        push_page(&mut builder, page, limit);

        let films = builder.build_query_as::<Film>().fetch_all(&self.pool).await?;
        Ok(films)
    }

    async fn films_by_cast(
        &self,
        title: Option<&str>,
        name: Option<&str>,
        surname: Option<&str>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Film>, RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT DISTINCT {FILM_COLUMNS} FROM films f \
             JOIN starred s ON s.film_id = f.id \
             JOIN actors a ON a.id = s.actor_id WHERE TRUE"
        ));
        push_contains(&mut builder, "f.title", title);
        push_contains(&mut builder, "a.name", name);
        push_contains(&mut builder, "a.surname", surname);
        builder.push(" ORDER BY f.id");
        push_page(&mut builder, page, limit);

        let films = builder.build_query_as::<Film>().fetch_all(&self.pool).await?;
        Ok(films)
    }

    async fn film_cast(&self, film_id: i32) -> Result<Vec<CastMember>, RepoError> {
        let cast = sqlx::query_as::<_, CastMember>(
            "SELECT a.name, a.surname FROM actors a JOIN starred s ON a.id = s.actor_id \
             WHERE s.film_id = $1 ORDER BY a.id",
        )
        .bind(film_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(cast)
    }
}

/// PostgresTransaction
///
/// Owns one pooled connection with an open transaction. `None` once finished.
/// Dropping it while still open rolls the transaction back.
pub struct PostgresTransaction {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PostgresTransaction {
    fn conn(&mut self) -> Result<&mut PgConnection, RepoError> {
        self.tx.as_deref_mut().ok_or(RepoError::Finished)
    }
}

fn expect_row(rows_affected: u64, entity: &'static str) -> Result<(), RepoError> {
    if rows_affected == 0 {
        Err(RepoError::not_found(entity))
    } else {
        Ok(())
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn create_user(
        &mut self,
        login: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<i32, RepoError> {
        let id = sqlx::query_scalar(
            "INSERT INTO users (login, password, user_role) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(login)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(self.conn()?)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepoError::Conflict(format!("user {login}"))
            }
            _ => RepoError::from(err),
        })?;
        Ok(id)
    }

    async fn update_user_role(&mut self, login: &str, role: Role) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE users SET user_role = $1 WHERE login = $2")
            .bind(role.as_str())
            .bind(login)
            .execute(self.conn()?)
            .await?;
        expect_row(result.rows_affected(), "user")
    }

    async fn delete_user(&mut self, id: i32) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.conn()?)
            .await?;
        expect_row(result.rows_affected(), "user")
    }

    async fn create_actor(&mut self, actor: &NewActor) -> Result<i32, RepoError> {
        let id = sqlx::query_scalar(
            "INSERT INTO actors (name, surname, sex, birthday) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&actor.name)
        .bind(&actor.surname)
        .bind(actor.sex.as_str())
        .bind(actor.birthday)
        .fetch_one(self.conn()?)
        .await?;
        Ok(id)
    }

    async fn update_actor(&mut self, id: i32, update: &ActorUpdate) -> Result<(), RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE actors SET ");
        push_assignments(&mut builder, update.assignments());
        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let result = builder.build().execute(self.conn()?).await?;
        expect_row(result.rows_affected(), "actor")
    }

    async fn delete_actor(&mut self, id: i32) -> Result<(), RepoError> {
        // starred rows go through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM actors WHERE id = $1")
            .bind(id)
            .execute(self.conn()?)
            .await?;
        expect_row(result.rows_affected(), "actor")
    }

    async fn create_film(&mut self, film: &NewFilm) -> Result<i32, RepoError> {
        let id = sqlx::query_scalar(
            "INSERT INTO films (title, description, issue_date, rating) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&film.title)
        .bind(&film.description)
        .bind(film.issue_date)
        .bind(film.rating)
        .fetch_one(self.conn()?)
        .await?;
        Ok(id)
    }

    async fn add_cast_member(&mut self, film_id: i32, actor_id: i32) -> Result<(), RepoError> {
        sqlx::query("INSERT INTO starred (film_id, actor_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(film_id)
            .bind(actor_id)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn update_film(&mut self, id: i32, update: &FilmUpdate) -> Result<(), RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE films SET ");
        push_assignments(&mut builder, update.assignments());
        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let result = builder.build().execute(self.conn()?).await?;
        expect_row(result.rows_affected(), "film")
    }

    async fn replace_cast(&mut self, film_id: i32, actor_ids: &[i32]) -> Result<(), RepoError> {
        let conn = self.conn()?;

        let exists: Option<i32> = sqlx::query_scalar("SELECT id FROM films WHERE id = $1")
            .bind(film_id)
            .fetch_optional(&mut *conn)
            .await?;
        if exists.is_none() {
            return Err(RepoError::not_found("film"));
        }

        sqlx::query("DELETE FROM starred WHERE film_id = $1 AND NOT (actor_id = ANY($2))")
            .bind(film_id)
            .bind(actor_ids)
            .execute(&mut *conn)
            .await?;

        for actor_id in actor_ids {
            sqlx::query(
                "INSERT INTO starred (film_id, actor_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(film_id)
            .bind(*actor_id)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    async fn delete_film(&mut self, id: i32) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM films WHERE id = $1")
            .bind(id)
            .execute(self.conn()?)
            .await?;
        expect_row(result.rows_affected(), "film")
    }

    async fn commit(&mut self) -> Result<(), RepoError> {
        let tx = self.tx.take().ok_or(RepoError::Finished)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), RepoError> {
        // A failed commit has already ended the transaction server-side.
        match self.tx.take() {
            Some(tx) => Ok(tx.rollback().await?),
            None => Ok(()),
        }
    }
}
