//! Movie records, the shared resource guarded by permissions and versions.

use std::fmt;

use std::collections::HashSet;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use validator::ValidationError;

use crate::data::version::{Version, Versioned};

pub type MovieId = i64;

/// Running time in minutes. Rendered on the wire as `"<n> mins"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Runtime(pub u32);

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mins", self.0)
    }
}

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let minutes = raw
            .strip_suffix(" mins")
            .and_then(|n| n.parse::<u32>().ok())
            .ok_or_else(|| de::Error::custom("invalid runtime format, expected \"<n> mins\""))?;
        Ok(Runtime(minutes))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
    pub version: Version,
    #[serde(skip)]
    pub created_at: u64,
}

impl Versioned for Movie {
    const KIND: &'static str = "movie";

    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}

#[derive(Debug, Clone)]
pub struct NewMovie {
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
}

/// `validator` rule: a movie runs for at least a minute.
pub fn validate_runtime(runtime: &Runtime) -> Result<(), ValidationError> {
    if runtime.0 == 0 {
        return Err(ValidationError::new("range").with_message("must be a positive integer".into()));
    }
    Ok(())
}

/// `validator` rule: no genre listed twice.
pub fn validate_genres(genres: &[String]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(genres.len());
    if genres.iter().all(|g| seen.insert(g.as_str())) {
        Ok(())
    } else {
        Err(ValidationError::new("unique").with_message("must not contain duplicate values".into()))
    }
}
