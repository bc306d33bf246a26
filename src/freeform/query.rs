use super::error::{FreeformError, Result};
use super::toolkit::Tool;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Column, Connection, Executor, Row, Statement, TypeInfo, ValueRef};
use std::path::Path;
use tracing::{debug, info};

/// Returned for statements that produce no result columns (DDL, DML).
pub const NO_RESULT: &str = "column\n(no result)";

/// SQL over a CSV file loaded into a private in-memory SQLite database.
///
/// Every column is stored as TEXT; queries cast as needed. The connection is
/// owned here and mutated only by the statements callers run against it.
pub struct QueryTool {
    conn: SqliteConnection,
    table: String,
    columns: Vec<String>,
}

impl QueryTool {
    pub async fn from_csv(path: &Path, table: &str) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            FreeformError::Dataset(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let mut reader = csv::Reader::from_reader(file);
        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|c| c.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        info!(
            "Loaded {} rows from {} into table '{}'",
            rows.len(),
            path.display(),
            table
        );
        Self::from_records(table, columns, rows).await
    }

    pub async fn from_records(
        table: &str,
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Result<Self> {
        if table.trim().is_empty() {
            return Err(FreeformError::Dataset("Table name must not be empty".to_string()));
        }
        if columns.is_empty() || columns.iter().any(|c| c.is_empty()) {
            return Err(FreeformError::Dataset(
                "Source table needs a header row with non-empty column names".to_string(),
            ));
        }

        let mut conn = SqliteConnection::connect("sqlite::memory:").await?;

        let colspec = columns
            .iter()
            .map(|c| format!("{} TEXT", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let create_sql = format!("CREATE TABLE {} ({});", quote_ident(table), colspec);
        sqlx::query(&create_sql).execute(&mut conn).await?;

        let placeholders = vec!["?"; columns.len()].join(", ");
        let insert_sql = format!("INSERT INTO {} VALUES ({});", quote_ident(table), placeholders);

        let mut tx = conn.begin().await?;
        for (line, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(FreeformError::Dataset(format!(
                    "Row {} has {} fields, expected {}",
                    line + 1,
                    row.len(),
                    columns.len()
                )));
            }
            let mut query = sqlx::query(&insert_sql);
            for value in row {
                query = query.bind(value);
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(Self {
            conn,
            table: table.to_string(),
            columns,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Run one statement and render its result set as CSV.
    pub async fn exec_sql(&mut self, sql: &str) -> Result<String> {
        debug!("Executing SQL: {}", sql);
        // sqlx would run every statement and stack their rows under the
        // first statement's header.
        if statement_count(sql) > 1 {
            return Err(FreeformError::MultipleStatements);
        }
        let statement = (&mut self.conn).prepare(sql).await?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let rows = statement.query().fetch_all(&mut self.conn).await?;

        if columns.is_empty() {
            return Ok(NO_RESULT.to_string());
        }
        render_csv(&columns, &rows)
    }
}

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &str {
        "sql_exec_sqlite"
    }

    async fn execute(&mut self, body: &str) -> Result<String> {
        self.exec_sql(body).await
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Number of non-empty statements in `sql`. Semicolons inside quoted
/// strings, quoted identifiers and comments do not separate statements.
fn statement_count(sql: &str) -> usize {
    let mut count = 0;
    let mut has_content = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' | '[' => {
                has_content = true;
                let close = if c == '[' { ']' } else { c };
                for next in chars.by_ref() {
                    if next == close {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            ';' => {
                if has_content {
                    count += 1;
                }
                has_content = false;
            }
            c if c.is_whitespace() => {}
            _ => has_content = true,
        }
    }

    if has_content {
        count += 1;
    }
    count
}

fn render_csv(columns: &[String], rows: &[SqliteRow]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(columns)?;
    for row in rows {
        let record = (0..columns.len())
            .map(|i| render_value(row, i))
            .collect::<Result<Vec<_>>>()?;
        writer.write_record(&record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| FreeformError::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn render_value(row: &SqliteRow, index: usize) -> Result<String> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(String::new());
    }
    let value = match raw.type_info().name() {
        "INTEGER" => row.try_get_unchecked::<i64, _>(index)?.to_string(),
        "REAL" => format_real(row.try_get_unchecked::<f64, _>(index)?),
        "BLOB" => {
            String::from_utf8_lossy(&row.try_get_unchecked::<Vec<u8>, _>(index)?).into_owned()
        }
        _ => row.try_get_unchecked::<String, _>(index)?,
    };
    Ok(value)
}

// Python float repr: shortest round-trip digits, scientific notation when
// the decimal exponent is below -4 or at least 16, ".0" on whole values.
fn format_real(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{value:e}");
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if value != 0.0 && !(-4..16).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        let plain = value.to_string();
        if plain.contains('.') {
            plain
        } else {
            format!("{plain}.0")
        }
    }
}
