//! PostgreSQL storage implementation.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{debug, instrument};

use crate::error::{HealthStatus, StorageError, StorageResult};
use crate::traits::{
    FieldWithOptions, FormStore, FormTransaction, NewAuditEntry, NewField, NewOption,
    StoredAuditEntry, StoredField, StoredForm, StoredOption,
};

/// Default health check timeout in seconds.
/// Uses a shorter timeout than regular queries since health checks should be fast.
const DEFAULT_HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

/// Default query timeout in seconds.
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

const FIELD_COLUMNS: &str = "id, form_id, position, custom_id, type, style, label, \
                             description, placeholder, required, min_length, max_length";

/// PostgreSQL configuration options.
#[derive(Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    pub min_connections: u32,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Maximum time a single query may run before it fails with
    /// `StorageError::QueryTimeout`. Default: 30 seconds.
    pub query_timeout_secs: u64,
    /// Timeout for health checks in seconds. Default: 5 seconds.
    pub health_check_timeout_secs: u64,
}

// Custom Debug implementation to hide credentials in database_url
impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("database_url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("query_timeout_secs", &self.query_timeout_secs)
            .field("health_check_timeout_secs", &self.health_check_timeout_secs)
            .finish()
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/ticketdash".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            health_check_timeout_secs: DEFAULT_HEALTH_CHECK_TIMEOUT_SECS,
        }
    }
}

/// PostgreSQL implementation of FormStore.
pub struct PostgresFormStore {
    pool: PgPool,
    query_timeout: Duration,
    health_check_timeout: Duration,
}

impl PostgresFormStore {
    /// Creates a new PostgreSQL form store from a connection pool.
    ///
    /// Uses the default query timeout of 30 seconds.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            health_check_timeout: Duration::from_secs(DEFAULT_HEALTH_CHECK_TIMEOUT_SECS),
        }
    }

    /// Creates a new PostgreSQL form store with the given configuration.
    #[instrument(skip(config))]
    pub async fn from_config(config: &PostgresConfig) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(|e| StorageError::ConnectionError {
                message: e.to_string(),
            })?;

        Ok(Self {
            pool,
            query_timeout: Duration::from_secs(config.query_timeout_secs),
            health_check_timeout: Duration::from_secs(config.health_check_timeout_secs),
        })
    }

    /// Creates a new PostgreSQL form store from a database URL.
    pub async fn from_url(database_url: &str) -> StorageResult<Self> {
        let config = PostgresConfig {
            database_url: database_url.to_string(),
            ..Default::default()
        };
        Self::from_config(&config).await
    }

    /// Runs database migrations to create required tables.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> StorageResult<()> {
        debug!("Running database migrations");

        let statements = [
            (
                "forms table",
                r#"
                CREATE TABLE IF NOT EXISTS forms (
                    id SERIAL PRIMARY KEY,
                    guild_id BIGINT NOT NULL,
                    title VARCHAR(45) NOT NULL,
                    custom_id VARCHAR(100) NOT NULL UNIQUE
                )
                "#,
            ),
            (
                "form_input table",
                r#"
                CREATE TABLE IF NOT EXISTS form_input (
                    id SERIAL PRIMARY KEY,
                    form_id INT NOT NULL,
                    position SMALLINT NOT NULL,
                    custom_id VARCHAR(100) NOT NULL,
                    type SMALLINT NOT NULL,
                    style SMALLINT,
                    label VARCHAR(45) NOT NULL,
                    description VARCHAR(100),
                    placeholder VARCHAR(100),
                    required BOOLEAN NOT NULL DEFAULT TRUE,
                    min_length INT,
                    max_length INT,
                    UNIQUE (form_id, custom_id),
                    FOREIGN KEY (form_id) REFERENCES forms(id) ON DELETE CASCADE
                )
                "#,
            ),
            (
                "form_input_option table",
                r#"
                CREATE TABLE IF NOT EXISTS form_input_option (
                    id SERIAL PRIMARY KEY,
                    form_input_id INT NOT NULL,
                    position SMALLINT NOT NULL,
                    label VARCHAR(100) NOT NULL,
                    description VARCHAR(100),
                    value VARCHAR(100) NOT NULL,
                    FOREIGN KEY (form_input_id) REFERENCES form_input(id) ON DELETE CASCADE
                )
                "#,
            ),
            (
                "audit_log table",
                r#"
                CREATE TABLE IF NOT EXISTS audit_log (
                    id BIGSERIAL PRIMARY KEY,
                    guild_id BIGINT,
                    user_id BIGINT NOT NULL,
                    action_type VARCHAR(64) NOT NULL,
                    resource_type VARCHAR(64) NOT NULL,
                    resource_id VARCHAR(255),
                    old_data JSONB,
                    new_data JSONB,
                    metadata JSONB,
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
                )
                "#,
            ),
            (
                "form_input index",
                "CREATE INDEX IF NOT EXISTS idx_form_input_form ON form_input(form_id, position)",
            ),
            (
                "form_input_option index",
                "CREATE INDEX IF NOT EXISTS idx_form_input_option_input \
                 ON form_input_option(form_input_id, position)",
            ),
            (
                "audit_log index",
                "CREATE INDEX IF NOT EXISTS idx_audit_log_guild \
                 ON audit_log(guild_id, created_at DESC, id DESC)",
            ),
        ];

        for (name, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::QueryError {
                    message: format!("Failed to create {name}: {e}"),
                })?;
        }

        debug!("Database migrations completed");
        Ok(())
    }
}

/// Wraps an async operation with a timeout and records metrics.
///
/// # Metrics
/// - `ticketdash_storage_query_duration_seconds` - Histogram of query durations
/// - `ticketdash_storage_query_timeout_total` - Counter of timeout events
async fn execute_with_timeout<T, F>(operation: &str, timeout: Duration, future: F) -> StorageResult<T>
where
    F: std::future::Future<Output = StorageResult<T>>,
{
    let start = Instant::now();
    let result = tokio::time::timeout(timeout, future).await;
    let duration = start.elapsed().as_secs_f64();

    let (status, final_result) = match result {
        Ok(Ok(value)) => ("success", Ok(value)),
        Ok(Err(e)) => ("error", Err(e)),
        Err(_elapsed) => (
            "timeout",
            Err(StorageError::QueryTimeout {
                operation: operation.to_string(),
                timeout,
            }),
        ),
    };

    metrics::histogram!(
        "ticketdash_storage_query_duration_seconds",
        "operation" => operation.to_string(),
        "status" => status
    )
    .record(duration);

    if status == "timeout" {
        metrics::counter!(
            "ticketdash_storage_query_timeout_total",
            "operation" => operation.to_string()
        )
        .increment(1);
    }

    final_result
}

fn query_error(action: &str) -> impl FnOnce(sqlx::Error) -> StorageError + '_ {
    move |e| StorageError::QueryError {
        message: format!("Failed to {action}: {e}"),
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> StorageResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name).map_err(|e| StorageError::QueryError {
        message: format!("Failed to read column {name}: {e}"),
    })
}

fn narrow<S, T>(value: S, name: &str) -> StorageResult<T>
where
    S: Copy + std::fmt::Display,
    T: TryFrom<S>,
{
    T::try_from(value).map_err(|_| StorageError::InternalError {
        message: format!("column {name} holds out-of-range value {value}"),
    })
}

fn snowflake(value: u64) -> StorageResult<i64> {
    i64::try_from(value).map_err(|_| StorageError::InternalError {
        message: format!("snowflake {value} does not fit in BIGINT"),
    })
}

fn row_to_form(row: &PgRow) -> StorageResult<StoredForm> {
    Ok(StoredForm {
        id: column(row, "id")?,
        guild_id: narrow(column::<i64>(row, "guild_id")?, "guild_id")?,
        title: column(row, "title")?,
        custom_id: column(row, "custom_id")?,
    })
}

fn row_to_field(row: &PgRow) -> StorageResult<StoredField> {
    Ok(StoredField {
        id: column(row, "id")?,
        form_id: column(row, "form_id")?,
        field_type: narrow(column::<i16>(row, "type")?, "type")?,
        position: narrow(column::<i16>(row, "position")?, "position")?,
        custom_id: column(row, "custom_id")?,
        label: column(row, "label")?,
        description: column(row, "description")?,
        placeholder: column(row, "placeholder")?,
        style: column::<Option<i16>>(row, "style")?
            .map(|v| narrow(v, "style"))
            .transpose()?,
        required: column(row, "required")?,
        min_length: column::<Option<i32>>(row, "min_length")?
            .map(|v| narrow(v, "min_length"))
            .transpose()?,
        max_length: column::<Option<i32>>(row, "max_length")?
            .map(|v| narrow(v, "max_length"))
            .transpose()?,
    })
}

fn row_to_option(row: &PgRow) -> StorageResult<StoredOption> {
    Ok(StoredOption {
        id: column(row, "id")?,
        field_id: column(row, "form_input_id")?,
        position: narrow(column::<i16>(row, "position")?, "position")?,
        label: column(row, "label")?,
        description: column(row, "description")?,
        value: column(row, "value")?,
    })
}

fn row_to_audit_entry(row: &PgRow) -> StorageResult<StoredAuditEntry> {
    Ok(StoredAuditEntry {
        id: column(row, "id")?,
        guild_id: column::<Option<i64>>(row, "guild_id")?
            .map(|v| narrow(v, "guild_id"))
            .transpose()?,
        user_id: narrow(column::<i64>(row, "user_id")?, "user_id")?,
        action_type: column(row, "action_type")?,
        resource_type: column(row, "resource_type")?,
        resource_id: column(row, "resource_id")?,
        old_data: column(row, "old_data")?,
        new_data: column(row, "new_data")?,
        metadata: column(row, "metadata")?,
        created_at: column(row, "created_at")?,
    })
}

#[async_trait]
impl FormStore for PostgresFormStore {
    #[instrument(skip(self, title, custom_id))]
    async fn create_form(
        &self,
        guild_id: u64,
        title: &str,
        custom_id: &str,
    ) -> StorageResult<StoredForm> {
        let guild = snowflake(guild_id)?;
        execute_with_timeout("create_form", self.query_timeout, async {
            let row = sqlx::query(
                "INSERT INTO forms (guild_id, title, custom_id) VALUES ($1, $2, $3) \
                 RETURNING id, guild_id, title, custom_id",
            )
            .bind(guild)
            .bind(title)
            .bind(custom_id)
            .fetch_one(&self.pool)
            .await
            .map_err(query_error("create form"))?;
            row_to_form(&row)
        })
        .await
    }

    async fn get_form(&self, form_id: i32) -> StorageResult<Option<StoredForm>> {
        execute_with_timeout("get_form", self.query_timeout, async {
            let row = sqlx::query("SELECT id, guild_id, title, custom_id FROM forms WHERE id = $1")
                .bind(form_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(query_error("fetch form"))?;
            row.as_ref().map(row_to_form).transpose()
        })
        .await
    }

    #[instrument(skip(self, title))]
    async fn update_form_title(&self, form_id: i32, title: &str) -> StorageResult<()> {
        execute_with_timeout("update_form_title", self.query_timeout, async {
            let result = sqlx::query("UPDATE forms SET title = $2 WHERE id = $1")
                .bind(form_id)
                .bind(title)
                .execute(&self.pool)
                .await
                .map_err(query_error("update form"))?;
            if result.rows_affected() == 0 {
                return Err(StorageError::FormNotFound { form_id });
            }
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    async fn delete_form(&self, form_id: i32) -> StorageResult<()> {
        execute_with_timeout("delete_form", self.query_timeout, async {
            let result = sqlx::query("DELETE FROM forms WHERE id = $1")
                .bind(form_id)
                .execute(&self.pool)
                .await
                .map_err(query_error("delete form"))?;
            if result.rows_affected() == 0 {
                return Err(StorageError::FormNotFound { form_id });
            }
            Ok(())
        })
        .await
    }

    async fn list_fields(&self, form_id: i32) -> StorageResult<Vec<FieldWithOptions>> {
        execute_with_timeout("list_fields", self.query_timeout, async {
            let field_rows = sqlx::query(&format!(
                "SELECT {FIELD_COLUMNS} FROM form_input WHERE form_id = $1 ORDER BY position, id"
            ))
            .bind(form_id)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error("fetch form inputs"))?;

            let option_rows = sqlx::query(
                "SELECT o.id, o.form_input_id, o.position, o.label, o.description, o.value \
                 FROM form_input_option o JOIN form_input i ON i.id = o.form_input_id \
                 WHERE i.form_id = $1 ORDER BY o.form_input_id, o.position, o.id",
            )
            .bind(form_id)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error("fetch form input options"))?;

            let mut options: HashMap<i32, Vec<StoredOption>> = HashMap::new();
            for row in &option_rows {
                let option = row_to_option(row)?;
                options.entry(option.field_id).or_default().push(option);
            }

            field_rows
                .iter()
                .map(|row| {
                    let field = row_to_field(row)?;
                    Ok(FieldWithOptions {
                        options: options.remove(&field.id).unwrap_or_default(),
                        field,
                    })
                })
                .collect()
        })
        .await
    }

    async fn begin(&self) -> StorageResult<Box<dyn FormTransaction>> {
        let tx = execute_with_timeout("begin", self.query_timeout, async {
            self.pool
                .begin()
                .await
                .map_err(|e| StorageError::TransactionError {
                    message: format!("Failed to begin transaction: {e}"),
                })
        })
        .await?;

        Ok(Box::new(PostgresTransaction {
            tx,
            query_timeout: self.query_timeout,
        }))
    }

    async fn insert_audit_entry(&self, entry: NewAuditEntry) -> StorageResult<()> {
        let guild = entry.guild_id.map(snowflake).transpose()?;
        let user = snowflake(entry.user_id)?;
        execute_with_timeout("insert_audit_entry", self.query_timeout, async {
            sqlx::query(
                "INSERT INTO audit_log \
                 (guild_id, user_id, action_type, resource_type, resource_id, old_data, new_data, metadata) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(guild)
            .bind(user)
            .bind(&entry.action_type)
            .bind(&entry.resource_type)
            .bind(&entry.resource_id)
            .bind(&entry.old_data)
            .bind(&entry.new_data)
            .bind(&entry.metadata)
            .execute(&self.pool)
            .await
            .map_err(query_error("insert audit entry"))?;
            Ok(())
        })
        .await
    }

    async fn list_audit_entries(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> StorageResult<Vec<StoredAuditEntry>> {
        let guild = snowflake(guild_id)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        execute_with_timeout("list_audit_entries", self.query_timeout, async {
            let rows = sqlx::query(
                "SELECT id, guild_id, user_id, action_type, resource_type, resource_id, \
                 old_data, new_data, metadata, created_at FROM audit_log \
                 WHERE guild_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
            )
            .bind(guild)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error("list audit entries"))?;
            rows.iter().map(row_to_audit_entry).collect()
        })
        .await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let start = Instant::now();

        // Uses a shorter dedicated timeout since health checks should be fast
        let check_result = tokio::time::timeout(self.health_check_timeout, async {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::HealthCheckFailed {
                    message: format!("database ping failed: {e}"),
                })
        })
        .await;

        let latency = start.elapsed();

        let status = match &check_result {
            Ok(Ok(_)) => "success",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        metrics::histogram!(
            "ticketdash_storage_health_check_duration_seconds",
            "status" => status
        )
        .record(latency.as_secs_f64());

        match check_result {
            Ok(result) => {
                result?;
            }
            Err(_elapsed) => {
                return Err(StorageError::HealthCheckFailed {
                    message: format!("database ping timed out after {:?}", self.health_check_timeout),
                });
            }
        }

        Ok(HealthStatus {
            healthy: true,
            latency,
            message: Some(format!(
                "postgres pool: {} connections, {} idle",
                self.pool.size(),
                self.pool.num_idle()
            )),
        })
    }
}

/// Transaction over a [`PostgresFormStore`]. Dropping it without committing
/// rolls back.
struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
    query_timeout: Duration,
}

impl PostgresTransaction {
    fn expect_one_row(affected: u64, what: String) -> StorageResult<()> {
        if affected == 0 {
            Err(StorageError::Conflict {
                message: format!("{what} no longer exists"),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl FormTransaction for PostgresTransaction {
    async fn delete_field(&mut self, form_id: i32, field_id: i32) -> StorageResult<()> {
        let timeout = self.query_timeout;
        let tx = &mut self.tx;
        execute_with_timeout("delete_field", timeout, async {
            let result = sqlx::query("DELETE FROM form_input WHERE id = $1 AND form_id = $2")
                .bind(field_id)
                .bind(form_id)
                .execute(&mut **tx)
                .await
                .map_err(query_error("delete form input"))?;
            Self::expect_one_row(
                result.rows_affected(),
                format!("input {field_id} of form {form_id}"),
            )
        })
        .await
    }

    async fn update_field(&mut self, field: &StoredField) -> StorageResult<()> {
        let timeout = self.query_timeout;
        let tx = &mut self.tx;
        execute_with_timeout("update_field", timeout, async {
            let result = sqlx::query(
                "UPDATE form_input SET position = $3, type = $4, style = $5, label = $6, \
                 description = $7, placeholder = $8, required = $9, min_length = $10, \
                 max_length = $11 WHERE id = $1 AND form_id = $2",
            )
            .bind(field.id)
            .bind(field.form_id)
            .bind(i16::from(field.position))
            .bind(i16::from(field.field_type))
            .bind(field.style.map(i16::from))
            .bind(&field.label)
            .bind(&field.description)
            .bind(&field.placeholder)
            .bind(field.required)
            .bind(field.min_length.map(i32::from))
            .bind(field.max_length.map(i32::from))
            .execute(&mut **tx)
            .await
            .map_err(query_error("update form input"))?;
            Self::expect_one_row(
                result.rows_affected(),
                format!("input {} of form {}", field.id, field.form_id),
            )
        })
        .await
    }

    async fn create_field(&mut self, field: &NewField) -> StorageResult<i32> {
        let timeout = self.query_timeout;
        let tx = &mut self.tx;
        execute_with_timeout("create_field", timeout, async {
            let row = sqlx::query(
                "INSERT INTO form_input (form_id, position, custom_id, type, style, label, \
                 description, placeholder, required, min_length, max_length) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING id",
            )
            .bind(field.form_id)
            .bind(i16::from(field.position))
            .bind(&field.custom_id)
            .bind(i16::from(field.field_type))
            .bind(field.style.map(i16::from))
            .bind(&field.label)
            .bind(&field.description)
            .bind(&field.placeholder)
            .bind(field.required)
            .bind(field.min_length.map(i32::from))
            .bind(field.max_length.map(i32::from))
            .fetch_one(&mut **tx)
            .await
            .map_err(query_error("create form input"))?;
            column(&row, "id")
        })
        .await
    }

    async fn list_options(&mut self, field_id: i32) -> StorageResult<Vec<StoredOption>> {
        let timeout = self.query_timeout;
        let tx = &mut self.tx;
        execute_with_timeout("list_options", timeout, async {
            let rows = sqlx::query(
                "SELECT id, form_input_id, position, label, description, value \
                 FROM form_input_option WHERE form_input_id = $1 ORDER BY position, id",
            )
            .bind(field_id)
            .fetch_all(&mut **tx)
            .await
            .map_err(query_error("fetch form input options"))?;
            rows.iter().map(row_to_option).collect()
        })
        .await
    }

    async fn delete_option(&mut self, option_id: i32) -> StorageResult<()> {
        let timeout = self.query_timeout;
        let tx = &mut self.tx;
        execute_with_timeout("delete_option", timeout, async {
            let result = sqlx::query("DELETE FROM form_input_option WHERE id = $1")
                .bind(option_id)
                .execute(&mut **tx)
                .await
                .map_err(query_error("delete form input option"))?;
            Self::expect_one_row(result.rows_affected(), format!("option {option_id}"))
        })
        .await
    }

    async fn create_option(&mut self, option: &NewOption) -> StorageResult<i32> {
        let timeout = self.query_timeout;
        let tx = &mut self.tx;
        execute_with_timeout("create_option", timeout, async {
            let row = sqlx::query(
                "INSERT INTO form_input_option (form_input_id, position, label, description, value) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING id",
            )
            .bind(option.field_id)
            .bind(i16::from(option.position))
            .bind(&option.label)
            .bind(&option.description)
            .bind(&option.value)
            .fetch_one(&mut **tx)
            .await
            .map_err(query_error("create form input option"))?;
            column(&row, "id")
        })
        .await
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let this = *self;
        execute_with_timeout("commit", this.query_timeout, async {
            this.tx
                .commit()
                .await
                .map_err(|e| StorageError::TransactionError {
                    message: format!("Failed to commit transaction: {e}"),
                })
        })
        .await
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        let this = *self;
        this.tx
            .rollback()
            .await
            .map_err(|e| StorageError::TransactionError {
                message: format!("Failed to roll back transaction: {e}"),
            })
    }
}
