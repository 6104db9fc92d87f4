use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

pub mod sink;
pub mod store;
pub mod validate;

pub use sink::{ConflictPolicy, EventLog, LogLevel, RecordSink, UpsertOutcome};
pub use store::{RecordStore, StoreError};
pub use validate::IdRejection;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Case-insensitive parse of operator text.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            _ => None,
        }
    }
}

/// One personal record as collected from the operator.
///
/// Field values are kept as the literal text that passed validation; they are
/// not coerced to numbers before being written to the JSON file or the sink.
/// The user id is the key of the owning [`RecordStore`] and is not repeated
/// inside the record.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct UserRecord {
    pub first_name: String,
    pub last_name: String,
    pub age: String,
    pub gender: String,
    pub year_of_birth: String,
}

impl Display for UserRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "first_name={}, last_name={}, age={}, gender={}, year_of_birth={}",
            self.first_name, self.last_name, self.age, self.gender, self.year_of_birth
        )
    }
}
