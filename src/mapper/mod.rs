// ============================================================================
// Entity mapping
// ============================================================================
//
// An entity is a plain serde struct mapped to one row of `E::TABLE`. Fields
// match columns by name; the `id` column is the key and is always assigned by
// the store on insert.
//
// ============================================================================

pub mod memory;
pub mod row;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use memory::MemoryMapper;

/// A type stored as one row of [`Entity::TABLE`].
///
/// ```
/// use dbsession::Entity;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Person {
///     id: Option<i64>,
///     name: String,
/// }
///
/// impl Entity for Person {
///     const TABLE: &'static str = "person";
///
///     fn id(&self) -> Option<i64> {
///         self.id
///     }
///
///     fn set_id(&mut self, id: i64) {
///         self.id = Some(id);
///     }
/// }
/// ```
///
/// Types without an identity field keep the defaults: they can be inserted
/// and read, and the generated key is discarded.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const TABLE: &'static str;

    fn id(&self) -> Option<i64> {
        None
    }

    /// Receives the key generated on insert.
    fn set_id(&mut self, _id: i64) {}
}
