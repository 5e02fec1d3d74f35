/// Data models for database entities
///
/// Rows map onto these structs through hand-written `FromRow` impls because
/// each blob is split over a bytes column and a type column.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

/// Opaque binary payload with its MIME type tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// A blob with no bytes counts as missing
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A picture category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub picture: Blob,
}

impl<'r> FromRow<'r, SqliteRow> for Category {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            picture: Blob {
                mime_type: row.try_get("picture_type")?,
                data: row.try_get("picture")?,
            },
        })
    }
}

/// A picture/sound item inside a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    pub picture: Blob,
    pub sound: Blob,
}

impl<'r> FromRow<'r, SqliteRow> for Item {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            category_id: row.try_get("category_id")?,
            name: row.try_get("name")?,
            picture: Blob {
                mime_type: row.try_get("picture_type")?,
                data: row.try_get("picture")?,
            },
            sound: Blob {
                mime_type: row.try_get("sound_type")?,
                data: row.try_get("sound")?,
            },
        })
    }
}

/// Input for creating a category, as collected by a form
///
/// Fields are optional so a half-filled form can be rejected with a
/// validation error instead of a type error at the boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub picture: Option<Blob>,
}

impl NewCategory {
    pub fn new(name: impl Into<String>, picture: Blob) -> Self {
        Self {
            name: name.into(),
            picture: Some(picture),
        }
    }
}

/// Input for creating an item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewItem {
    pub category_id: Option<i64>,
    pub name: String,
    pub picture: Option<Blob>,
    pub sound: Option<Blob>,
}

impl NewItem {
    pub fn new(category_id: i64, name: impl Into<String>, picture: Blob, sound: Blob) -> Self {
        Self {
            category_id: Some(category_id),
            name: name.into(),
            picture: Some(picture),
            sound: Some(sound),
        }
    }
}
