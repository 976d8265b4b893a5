//! Olfactory note dictionary repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use rayha_core::olfactory::OlfactoryFamily;
use rayha_core::{OlfactoryNoteId, Pyramid};

use super::RepositoryError;
use crate::models::{OlfactoryNote, OlfactoryNoteInput};

#[derive(sqlx::FromRow)]
struct OlfactoryNoteRow {
    id: OlfactoryNoteId,
    label: String,
    pyramid: Pyramid,
    family: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OlfactoryNoteRow> for OlfactoryNote {
    type Error = RepositoryError;

    fn try_from(row: OlfactoryNoteRow) -> Result<Self, Self::Error> {
        let family = row
            .family
            .as_deref()
            .map(str::parse::<OlfactoryFamily>)
            .transpose()
            .map_err(RepositoryError::DataCorruption)?;
        Ok(Self {
            id: row.id,
            label: row.label,
            pyramid: row.pyramid,
            family,
            created_at: row.created_at,
        })
    }
}

const NOTE_COLUMNS: &str = "id, label, pyramid, family, created_at";

/// Repository for olfactory notes.
pub struct OlfactoryNoteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OlfactoryNoteRepository<'a> {
    /// Create a new olfactory note repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Notes sorted by pyramid level then label, optionally for one level.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        pyramid: Option<Pyramid>,
    ) -> Result<Vec<OlfactoryNote>, RepositoryError> {
        let rows = sqlx::query_as::<_, OlfactoryNoteRow>(&format!(
            "SELECT {NOTE_COLUMNS} FROM rayha.olfactory_notes
             WHERE $1::rayha.pyramid IS NULL OR pyramid = $1
             ORDER BY pyramid, label"
        ))
        .bind(pyramid)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(OlfactoryNote::try_from).collect()
    }

    /// Add a note.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the label already exists at this level.
    pub async fn create(
        &self,
        input: &OlfactoryNoteInput,
    ) -> Result<OlfactoryNote, RepositoryError> {
        let row = sqlx::query_as::<_, OlfactoryNoteRow>(&format!(
            "INSERT INTO rayha.olfactory_notes (label, pyramid, family)
             VALUES ($1, $2, $3)
             RETURNING {NOTE_COLUMNS}"
        ))
        .bind(&input.label)
        .bind(input.pyramid)
        .bind(input.family.map(OlfactoryFamily::label))
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "Cette note existe déjà"))?;

        OlfactoryNote::try_from(row)
    }

    /// Edit a note.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the note does not exist, or
    /// `RepositoryError::Conflict` if the new label collides.
    pub async fn update(
        &self,
        id: OlfactoryNoteId,
        input: &OlfactoryNoteInput,
    ) -> Result<OlfactoryNote, RepositoryError> {
        let row = sqlx::query_as::<_, OlfactoryNoteRow>(&format!(
            "UPDATE rayha.olfactory_notes SET label = $2, pyramid = $3, family = $4
             WHERE id = $1
             RETURNING {NOTE_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.label)
        .bind(input.pyramid)
        .bind(input.family.map(OlfactoryFamily::label))
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "Cette note existe déjà"))?
        .ok_or(RepositoryError::NotFound)?;

        OlfactoryNote::try_from(row)
    }

    /// Delete a note.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the note does not exist.
    pub async fn delete(&self, id: OlfactoryNoteId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM rayha.olfactory_notes WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Insert notes that are not in the dictionary yet.
    ///
    /// Returns how many were added.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an insert fails.
    pub async fn import(&self, notes: &[OlfactoryNoteInput]) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut added = 0;
        for note in notes {
            let result = sqlx::query(
                "INSERT INTO rayha.olfactory_notes (label, pyramid, family)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (label, pyramid) DO NOTHING",
            )
            .bind(&note.label)
            .bind(note.pyramid)
            .bind(note.family.map(OlfactoryFamily::label))
            .execute(&mut *tx)
            .await?;
            added += result.rows_affected();
        }
        tx.commit().await?;
        Ok(added)
    }
}
