use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use crate::error::ValidationError;

/// Page size shared by every paginated listing and search.
pub const PAGE_LIMIT: i64 = 10;

/// date_format
///
/// Wire format for every date in the API: `DD-MM-YYYY`.
pub mod date_format {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%d-%m-%Y";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }

    /// Same format for fields that may be absent (partial updates).
    pub mod option {
        use super::FORMAT;
        use chrono::NaiveDate;
        use serde::{Deserialize, Deserializer};

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDate>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => NaiveDate::parse_from_str(&raw, FORMAT)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}

// --- Enumerations ---

/// Sex
///
/// Stored as lowercase text in `actors.sex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    #[default]
    Male,
    Female,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}

impl TryFrom<String> for Sex {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "male" => Ok(Sex::Male),
            "female" => Ok(Sex::Female),
            other => Err(ValidationError(format!("unknown sex {other}"))),
        }
    }
}

/// Role
///
/// The RBAC field of a user. Only `Admin` may run the mutating actor and film
/// endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Regular,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Regular => "regular",
            Role::Admin => "admin",
        }
    }
}

impl TryFrom<String> for Role {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "regular" => Ok(Role::Regular),
            "admin" => Ok(Role::Admin),
            other => Err(ValidationError(format!("unknown role {other}"))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SortKey
///
/// Accepted values of `?sort_by=` on `GET /films/list`. The column name is a
/// fixed string, never user text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    Title,
    #[default]
    Rating,
    IssueDate,
}

impl SortKey {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "title" => Some(SortKey::Title),
            "rating" => Some(SortKey::Rating),
            "issue_date" => Some(SortKey::IssueDate),
            _ => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortKey::Title => "title",
            SortKey::Rating => "rating",
            SortKey::IssueDate => "issue_date",
        }
    }
}

// --- Core Schemas (Mapped to Database) ---

/// User
///
/// A row of the `users` table. `password` holds the salted hash, never the
/// plaintext, and is not serialized.
#[derive(Debug, Clone, Serialize, FromRow, Default)]
pub struct User {
    pub id: i32,
    pub login: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[sqlx(try_from = "String")]
    pub user_role: Role,
}

/// Actor
///
/// A row of the `actors` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, Default)]
pub struct Actor {
    pub id: i32,
    pub name: String,
    pub surname: String,
    #[sqlx(try_from = "String")]
    pub sex: Sex,
    #[serde(with = "date_format")]
    pub birthday: NaiveDate,
}

/// Film
///
/// A row of the `films` table. `rating` is kept within `0..=10` by the
/// validators and by a table constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, Default)]
pub struct Film {
    pub id: i32,
    pub title: String,
    pub description: String,
    #[serde(with = "date_format")]
    pub issue_date: NaiveDate,
    pub rating: i32,
}

/// CastMember
///
/// An actor reference inside a film payload. Resolved to an actor id by exact
/// `(name, surname)` lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, Default)]
#[serde(deny_unknown_fields)]
pub struct CastMember {
    pub name: String,
    pub surname: String,
}

// --- Aggregates (Output) ---

/// ActorWithFilms
///
/// An actor together with every film it appears in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorWithFilms {
    pub actor: Actor,
    pub films: Vec<Film>,
}

/// FilmWithCast
///
/// A film with its cast flattened next to the film fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmWithCast {
    #[serde(flatten)]
    pub film: Film,
    pub cast: Vec<CastMember>,
}

// --- Request Payloads (Input Schemas) ---

/// NewUser
///
/// Registration payload (POST /users). The password is hashed by the user
/// service before it reaches the store.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewUser {
    pub login: String,
    pub password: String,
    pub user_role: Role,
}

/// Credentials
///
/// Login payload (GET /users).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

/// RoleUpdate
///
/// Payload of PUT /users: the target login and its new role.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleUpdate {
    pub login: String,
    pub user_role: Role,
}

/// NewActor
///
/// Creation payload (POST /actors). All four fields are required.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewActor {
    pub name: String,
    pub surname: String,
    pub sex: Sex,
    #[serde(with = "date_format")]
    pub birthday: NaiveDate,
}

/// NewFilm
///
/// Creation payload (POST /films). `description` defaults to empty and `cast`
/// to no actors; cast members are linked in the order given.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewFilm {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "date_format")]
    pub issue_date: NaiveDate,
    pub rating: i32,
    #[serde(default)]
    pub cast: Vec<CastMember>,
}

/// FieldValue
///
/// A single value in the `SET` clause of a partial update.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    Int(i32),
}

/// ActorUpdate
///
/// Partial update payload (PUT /actors?id=). The target id comes from the
/// query string; absent fields are left untouched.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ActorUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub sex: Option<Sex>,
    #[serde(default, deserialize_with = "date_format::option::deserialize")]
    pub birthday: Option<NaiveDate>,
}

impl ActorUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.surname.is_none() && self.sex.is_none() && self.birthday.is_none()
    }

    /// Column/value pairs for the supplied fields only, in column order.
    pub fn assignments(&self) -> Vec<(&'static str, FieldValue)> {
        let mut values = Vec::with_capacity(4);
        if let Some(name) = &self.name {
            values.push(("name", FieldValue::Text(name.clone())));
        }
        if let Some(surname) = &self.surname {
            values.push(("surname", FieldValue::Text(surname.clone())));
        }
        if let Some(sex) = self.sex {
            values.push(("sex", FieldValue::Text(sex.as_str().to_string())));
        }
        if let Some(birthday) = self.birthday {
            values.push(("birthday", FieldValue::Date(birthday)));
        }
        values
    }
}

/// FilmUpdate
///
/// Partial update payload (PUT /films?id=). Scalar fields feed the `SET`
/// clause; `cast`, when present, is the complete new cast.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FilmUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "date_format::option::deserialize")]
    pub issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default)]
    pub cast: Option<Vec<CastMember>>,
}

impl FilmUpdate {
    pub fn is_empty(&self) -> bool {
        self.assignments().is_empty() && self.cast.is_none()
    }

    /// Column/value pairs for the supplied scalar fields only.
    pub fn assignments(&self) -> Vec<(&'static str, FieldValue)> {
        let mut values = Vec::with_capacity(4);
        if let Some(title) = &self.title {
            values.push(("title", FieldValue::Text(title.clone())));
        }
        if let Some(description) = &self.description {
            values.push(("description", FieldValue::Text(description.clone())));
        }
        if let Some(issue_date) = self.issue_date {
            values.push(("issue_date", FieldValue::Date(issue_date)));
        }
        if let Some(rating) = self.rating {
            values.push(("rating", FieldValue::Int(rating)));
        }
        values
    }
}

// --- Search Fragments ---

/// ActorSearch
///
/// Substring filters for GET /actors/search. At least one must be present.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ActorSearch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
}

/// FilmSearch
///
/// Substring filters for GET /films/search. Either a title, or actor name
/// and/or surname (optionally narrowed by title).
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FilmSearch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
}

/// FilmQuery
///
/// The two mutually exclusive search modes a `FilmSearch` selects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilmQuery<'a> {
    Title(&'a str),
    Cast {
        title: Option<&'a str>,
        name: Option<&'a str>,
        surname: Option<&'a str>,
    },
}

impl FilmSearch {
    /// Any actor field selects the cast-join path; otherwise a present title
    /// selects the title path.
    pub fn mode(&self) -> Option<FilmQuery<'_>> {
        if self.name.is_some() || self.surname.is_some() {
            Some(FilmQuery::Cast {
                title: self.title.as_deref(),
                name: self.name.as_deref(),
                surname: self.surname.as_deref(),
            })
        } else {
            self.title.as_deref().map(FilmQuery::Title)
        }
    }
}
