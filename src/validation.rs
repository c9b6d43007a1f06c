//! Entity validators.
//!
//! Request bodies are decoded strictly (unknown fields rejected, required
//! fields enforced by the payload types) and then checked against the rules
//! serde cannot express.

use serde::de::DeserializeOwned;

use crate::error::ValidationError;
use crate::models::{
    ActorSearch, ActorUpdate, Credentials, FilmSearch, FilmUpdate, NewActor, NewFilm,
    NewUser, RoleUpdate,
};

const MIN_RATING: i32 = 0;
const MAX_RATING: i32 = 10;

/// Post-decode rules for a payload type. Types whose rules are all enforced
/// while decoding (required fields, enum values) keep the default.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Decode `body` into `T` and run its rules. Pure: no side effects.
pub fn decode<T>(body: &[u8]) -> Result<T, ValidationError>
where
    T: DeserializeOwned + Validate,
{
    let value: T = serde_json::from_slice(body)?;
    value.validate()?;
    Ok(value)
}

fn check_rating(rating: i32) -> Result<(), ValidationError> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(ValidationError(format!(
            "rating {rating} out of range {MIN_RATING}..={MAX_RATING}"
        )))
    }
}

impl Validate for NewActor {}
impl Validate for NewUser {}
impl Validate for Credentials {}
impl Validate for RoleUpdate {}

impl Validate for NewFilm {
    fn validate(&self) -> Result<(), ValidationError> {
        check_rating(self.rating)
    }
}

impl Validate for ActorUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError(
                "invalid state for required field(s) to update actor".into(),
            ));
        }
        Ok(())
    }
}

impl Validate for FilmUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError(
                "invalid state for required field(s) to update film".into(),
            ));
        }
        match self.rating {
            Some(rating) => check_rating(rating),
            None => Ok(()),
        }
    }
}

impl Validate for ActorSearch {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_none() && self.surname.is_none() {
            return Err(ValidationError("parameters for search not specified".into()));
        }
        Ok(())
    }
}

impl Validate for FilmSearch {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.mode() {
            Some(_) => Ok(()),
            None => Err(ValidationError("parameters for search not specified".into())),
        }
    }
}
