//! PostgreSQL backed publication store and archive file registry.
//!
//! The pipeline itself is synchronous; [`Database`] owns a current-thread
//! runtime and blocks on each query.

use apt_repository::{hash_data, ContentDigests, Package, Source};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use sqlx_postgres::PgPoolOptions;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::error::PublisherResult;
use crate::model::{
    BinaryPublication, PoolFile, PublishingStatus, SourcePublication, SuiteKey,
};
use crate::registry::{ArchiveFile, ArchiveFileRegistry};
use crate::store::{PublicationFilter, PublicationStore};

const SCHEMA: &str = include_str!("../schema.sql");

const SOURCE_COLUMNS: &str = "id, archive_id, series, pocket, component, status, \
     scheduled_deletion_date, date_removed, stanza, files";

const BINARY_COLUMNS: &str = "id, archive_id, series, pocket, component, architecture, \
     format, source_name, status, scheduled_deletion_date, date_removed, stanza, file";

const ARCHIVE_FILE_COLUMNS: &str =
    "id, archive_id, container, path, size, md5, sha1, sha256, scheduled_deletion_date";

/// Filter shared by the source and binary queries; `$1`..`$5` are bound
/// by [`FilterBinds`].
const FILTER_CLAUSE: &str = "WHERE archive_id = $1 \
     AND (cardinality($2::text[]) = 0 OR status = ANY($2)) \
     AND ($3::text IS NULL OR series = $3) \
     AND ($4::text IS NULL OR pocket = $4) \
     AND (NOT $5 OR (scheduled_deletion_date IS NULL AND date_removed IS NULL)) \
     ORDER BY id";

struct FilterBinds {
    archive_id: i64,
    statuses: Vec<String>,
    series: Option<String>,
    pocket: Option<String>,
    awaiting_removal: bool,
}

impl From<&PublicationFilter> for FilterBinds {
    fn from(filter: &PublicationFilter) -> Self {
        Self {
            archive_id: filter.archive_id,
            statuses: filter.statuses.iter().map(|s| s.as_str().to_string()).collect(),
            series: filter.suite.as_ref().map(|s| s.series.clone()),
            pocket: filter.suite.as_ref().map(|s| s.pocket.as_str().to_string()),
            awaiting_removal: filter.awaiting_removal,
        }
    }
}

fn suite_from_row(row: &PgRow) -> PublisherResult<SuiteKey> {
    let series: String = row.try_get("series")?;
    let pocket: String = row.try_get("pocket")?;
    Ok(SuiteKey::new(series, pocket.parse()?))
}

fn source_from_row(row: &PgRow) -> PublisherResult<SourcePublication> {
    let status: String = row.try_get("status")?;
    let Json(stanza): Json<Source> = row.try_get("stanza")?;
    let Json(files): Json<Vec<PoolFile>> = row.try_get("files")?;
    Ok(SourcePublication {
        id: row.try_get("id")?,
        archive_id: row.try_get("archive_id")?,
        suite: suite_from_row(row)?,
        component: row.try_get("component")?,
        status: status.parse()?,
        scheduled_deletion_date: row.try_get("scheduled_deletion_date")?,
        date_removed: row.try_get("date_removed")?,
        stanza,
        files,
    })
}

fn binary_from_row(row: &PgRow) -> PublisherResult<BinaryPublication> {
    let status: String = row.try_get("status")?;
    let format: String = row.try_get("format")?;
    let Json(stanza): Json<Package> = row.try_get("stanza")?;
    let Json(file): Json<PoolFile> = row.try_get("file")?;
    Ok(BinaryPublication {
        id: row.try_get("id")?,
        archive_id: row.try_get("archive_id")?,
        suite: suite_from_row(row)?,
        component: row.try_get("component")?,
        architecture: row.try_get("architecture")?,
        format: format.parse()?,
        source_name: row.try_get("source_name")?,
        status: status.parse()?,
        scheduled_deletion_date: row.try_get("scheduled_deletion_date")?,
        date_removed: row.try_get("date_removed")?,
        stanza,
        file,
    })
}

fn archive_file_from_row(row: &PgRow) -> PublisherResult<ArchiveFile> {
    let size: i64 = row.try_get("size")?;
    Ok(ArchiveFile {
        id: row.try_get("id")?,
        archive_id: row.try_get("archive_id")?,
        container: row.try_get("container")?,
        path: row.try_get("path")?,
        size: size as u64,
        digests: ContentDigests {
            md5: row.try_get("md5")?,
            sha1: row.try_get("sha1")?,
            sha256: row.try_get("sha256")?,
        },
        scheduled_deletion_date: row.try_get("scheduled_deletion_date")?,
    })
}

pub struct Database {
    runtime: Runtime,
    pool: PgPool,
}

impl Database {
    pub fn connect(url: &str, max_connections: u32) -> PublisherResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let pool = runtime.block_on(
            PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(url),
        )?;
        debug!("Connected to database");
        Ok(Self { runtime, pool })
    }

    /// Create the tables if they do not exist yet.
    pub fn initialize_schema(&self) -> PublisherResult<()> {
        self.runtime
            .block_on(sqlx::raw_sql(SCHEMA).execute(&self.pool))?;
        Ok(())
    }

    /// Add a source publication, returning its id.
    pub fn insert_source(&self, publication: &SourcePublication) -> PublisherResult<i64> {
        let query = "INSERT INTO source_publication \
             (archive_id, series, pocket, component, status, scheduled_deletion_date, \
              date_removed, stanza, files) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id";
        let row = self.runtime.block_on(
            sqlx::query(query)
                .bind(publication.archive_id)
                .bind(&publication.suite.series)
                .bind(publication.suite.pocket.as_str())
                .bind(&publication.component)
                .bind(publication.status.as_str())
                .bind(publication.scheduled_deletion_date)
                .bind(publication.date_removed)
                .bind(Json(&publication.stanza))
                .bind(Json(&publication.files))
                .fetch_one(&self.pool),
        )?;
        Ok(row.try_get("id")?)
    }

    /// Add a binary publication, returning its id.
    pub fn insert_binary(&self, publication: &BinaryPublication) -> PublisherResult<i64> {
        let query = "INSERT INTO binary_publication \
             (archive_id, series, pocket, component, architecture, format, source_name, \
              status, scheduled_deletion_date, date_removed, stanza, file) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING id";
        let row = self.runtime.block_on(
            sqlx::query(query)
                .bind(publication.archive_id)
                .bind(&publication.suite.series)
                .bind(publication.suite.pocket.as_str())
                .bind(&publication.component)
                .bind(&publication.architecture)
                .bind(publication.format.as_str())
                .bind(&publication.source_name)
                .bind(publication.status.as_str())
                .bind(publication.scheduled_deletion_date)
                .bind(publication.date_removed)
                .bind(Json(&publication.stanza))
                .bind(Json(&publication.file))
                .fetch_one(&self.pool),
        )?;
        Ok(row.try_get("id")?)
    }

    fn fetch_filtered(&self, table: &str, columns: &str, filter: &PublicationFilter) -> PublisherResult<Vec<PgRow>> {
        let binds = FilterBinds::from(filter);
        let query = format!("SELECT {} FROM {} {}", columns, table, FILTER_CLAUSE);
        let rows = self.runtime.block_on(
            sqlx::query(&query)
                .bind(binds.archive_id)
                .bind(binds.statuses)
                .bind(binds.series)
                .bind(binds.pocket)
                .bind(binds.awaiting_removal)
                .fetch_all(&self.pool),
        )?;
        Ok(rows)
    }

    fn set_status(
        &self,
        table: &str,
        id: i64,
        status: PublishingStatus,
        scheduled_deletion_date: Option<DateTime<Utc>>,
    ) -> PublisherResult<()> {
        let query = format!(
            "UPDATE {} SET status = $2, scheduled_deletion_date = $3 WHERE id = $1",
            table
        );
        self.runtime.block_on(
            sqlx::query(&query)
                .bind(id)
                .bind(status.as_str())
                .bind(scheduled_deletion_date)
                .execute(&self.pool),
        )?;
        Ok(())
    }
}

impl PublicationStore for Database {
    fn get_sources(&self, filter: &PublicationFilter) -> PublisherResult<Vec<SourcePublication>> {
        self.fetch_filtered("source_publication", SOURCE_COLUMNS, filter)?
            .iter()
            .map(source_from_row)
            .collect()
    }

    fn get_binaries(&self, filter: &PublicationFilter) -> PublisherResult<Vec<BinaryPublication>> {
        self.fetch_filtered("binary_publication", BINARY_COLUMNS, filter)?
            .iter()
            .map(binary_from_row)
            .collect()
    }

    fn set_source_status(
        &self,
        id: i64,
        status: PublishingStatus,
        scheduled_deletion_date: Option<DateTime<Utc>>,
    ) -> PublisherResult<()> {
        self.set_status("source_publication", id, status, scheduled_deletion_date)
    }

    fn set_binary_status(
        &self,
        id: i64,
        status: PublishingStatus,
        scheduled_deletion_date: Option<DateTime<Utc>>,
    ) -> PublisherResult<()> {
        self.set_status("binary_publication", id, status, scheduled_deletion_date)
    }
}

impl ArchiveFileRegistry for Database {
    fn get_by_archive(&self, archive_id: i64, container: &str) -> PublisherResult<Vec<ArchiveFile>> {
        let query = format!(
            "SELECT {} FROM archive_file WHERE archive_id = $1 AND container = $2 ORDER BY id",
            ARCHIVE_FILE_COLUMNS
        );
        let rows = self.runtime.block_on(
            sqlx::query(&query)
                .bind(archive_id)
                .bind(container)
                .fetch_all(&self.pool),
        )?;
        rows.iter().map(archive_file_from_row).collect()
    }

    fn new_from_file(
        &self,
        archive_id: i64,
        container: &str,
        path: &str,
        content: &[u8],
    ) -> PublisherResult<ArchiveFile> {
        let (size, digests) = hash_data(content);
        let query = format!(
            "INSERT INTO archive_file (archive_id, container, path, size, md5, sha1, sha256, content) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            ARCHIVE_FILE_COLUMNS
        );
        let row = self.runtime.block_on(
            sqlx::query(&query)
                .bind(archive_id)
                .bind(container)
                .bind(path)
                .bind(size as i64)
                .bind(&digests.md5)
                .bind(&digests.sha1)
                .bind(&digests.sha256)
                .bind(content)
                .fetch_one(&self.pool),
        )?;
        archive_file_from_row(&row)
    }

    fn schedule_deletion(&self, ids: &[i64], when: DateTime<Utc>) -> PublisherResult<()> {
        self.runtime.block_on(
            sqlx::query("UPDATE archive_file SET scheduled_deletion_date = $2 WHERE id = ANY($1)")
                .bind(ids)
                .bind(when)
                .execute(&self.pool),
        )?;
        Ok(())
    }

    fn unschedule_deletion(&self, ids: &[i64]) -> PublisherResult<()> {
        self.runtime.block_on(
            sqlx::query("UPDATE archive_file SET scheduled_deletion_date = NULL WHERE id = ANY($1)")
                .bind(ids)
                .execute(&self.pool),
        )?;
        Ok(())
    }

    fn reap(
        &self,
        archive_id: i64,
        container: &str,
        now: DateTime<Utc>,
    ) -> PublisherResult<Vec<ArchiveFile>> {
        let query = format!(
            "DELETE FROM archive_file \
             WHERE archive_id = $1 AND container = $2 AND scheduled_deletion_date < $3 \
             RETURNING {}",
            ARCHIVE_FILE_COLUMNS
        );
        let rows = self.runtime.block_on(
            sqlx::query(&query)
                .bind(archive_id)
                .bind(container)
                .bind(now)
                .fetch_all(&self.pool),
        )?;
        let reaped: Vec<ArchiveFile> = rows
            .iter()
            .map(archive_file_from_row)
            .collect::<PublisherResult<_>>()?;
        debug!("Reaped {} files from {}", reaped.len(), container);
        Ok(reaped)
    }

    fn read_content(&self, file: &ArchiveFile) -> PublisherResult<Vec<u8>> {
        let row = self.runtime.block_on(
            sqlx::query("SELECT content FROM archive_file WHERE id = $1")
                .bind(file.id)
                .fetch_one(&self.pool),
        )?;
        Ok(row.try_get("content")?)
    }
}
