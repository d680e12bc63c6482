//! Shared row-mapping helpers.

use sqlx::sqlite::SqliteRow;

use warden_types::prelude::*;

pub(crate) fn inspect(err: &sqlx::Error) {
	warn!("DB: {:#?}", err);
}

/// Map a fetched row, translating `RowNotFound` into the given
/// not-found code and everything else into `DbError`.
pub(crate) fn map_res<T, F>(
	row: Result<SqliteRow, sqlx::Error>,
	not_found: &'static str,
	f: F,
) -> WdResult<T>
where
	F: FnOnce(SqliteRow) -> Result<T, sqlx::Error>,
{
	match row {
		Ok(row) => f(row).inspect_err(inspect).map_err(|_| Error::DbError),
		Err(sqlx::Error::RowNotFound) => Err(Error::not_found(not_found)),
		Err(err) => {
			inspect(&err);
			Err(Error::DbError)
		}
	}
}

pub(crate) fn collect_res<T>(
	iter: impl Iterator<Item = Result<T, sqlx::Error>>,
) -> WdResult<Vec<T>> {
	let mut items = Vec::new();
	for item in iter {
		items.push(item.inspect_err(inspect).map_err(|_| Error::DbError)?);
	}
	Ok(items)
}

/// Unique-constraint violations carry a dedicated conflict code
pub(crate) fn map_insert_err(err: sqlx::Error, conflict: &'static str) -> Error {
	if let sqlx::Error::Database(ref db_err) = err {
		if db_err.is_unique_violation() {
			return Error::conflict(conflict, "Already exists");
		}
	}
	inspect(&err);
	Error::DbError
}

/// JSON column codec: store as TEXT, tolerate NULL
pub(crate) fn to_json_text<T: serde::Serialize>(value: &T) -> WdResult<String> {
	serde_json::to_string(value).map_err(Error::from)
}

pub(crate) fn from_json_text<T: serde::de::DeserializeOwned + Default>(
	text: Option<String>,
) -> T {
	text.and_then(|t| serde_json::from_str(&t).ok()).unwrap_or_default()
}

// vim: ts=4
