//! Client-generated ids for provisional entities.
//!
//! Server ids are UUIDs; provisional ids live in a separate namespace
//! (`temp-<ulid>`) so they can never collide with, or be mistaken for, an
//! id the backend assigned.

use ulid::Ulid;

/// Prefix marking an id as client-generated.
pub const PROVISIONAL_PREFIX: &str = "temp-";

/// Mint a fresh provisional id.
#[must_use]
pub fn provisional_id() -> String {
    format!(
        "{PROVISIONAL_PREFIX}{}",
        Ulid::new().to_string().to_ascii_lowercase()
    )
}

/// Whether `id` was minted by [`provisional_id`].
#[must_use]
pub fn is_provisional(id: &str) -> bool {
    id.starts_with(PROVISIONAL_PREFIX)
}
