pub use masterror::{AppError, AppResult};

/// Create input error for malformed or missing required fields
pub fn input_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(message.into())
}

/// Create file read error
pub fn file_read_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to read file '{}': {}", path, source))
}

/// Create file write error
pub fn file_write_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to write file '{}': {}", path, source))
}

/// Create schema parse error with optional position info
pub fn schema_parse_error(message: impl Into<String>) -> AppError {
    let msg = message.into();
    AppError::bad_request(format_sql_error("Schema parse error", &msg))
}

/// Create error for a snapshot missing from the owner's namespace
pub fn snapshot_not_found(name: &str) -> AppError {
    AppError::not_found(format!("Schema snapshot '{}' not found", name))
}

/// Create error for a missing or unreadable credential
pub fn unauthorized_error(message: impl Into<String>) -> AppError {
    AppError::unauthorized(message.into())
}

/// Create error for an operation refused by a safety gate
pub fn forbidden_error(message: impl Into<String>) -> AppError {
    AppError::forbidden(message.into())
}

/// Create LLM API error
pub fn llm_api_error(message: impl Into<String>) -> AppError {
    AppError::service(message.into())
}

/// Create HTTP error
pub fn http_error(err: reqwest::Error) -> AppError {
    let msg = if err.is_timeout() {
        format!("Request timeout: {}", err)
    } else if err.is_connect() {
        format!("Connection failed: {}", err)
    } else if err.is_status() {
        format!("HTTP error {}: {}", err.status().unwrap_or_default(), err)
    } else {
        err.to_string()
    };
    AppError::service(msg)
}

/// Create database error
pub fn database_error(err: sqlx::Error) -> AppError {
    let msg = match &err {
        sqlx::Error::PoolTimedOut => format!("Database timeout: {}", err),
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) => format!("Database connection failed: {}", err),
        _ => format!("Database error: {}", err)
    };
    AppError::service(msg)
}

/// Create config error
pub fn config_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(message.into())
}

/// Create serialization error
pub fn serialization_error(err: serde_json::Error) -> AppError {
    AppError::internal(format!("Serialization failed: {}", err))
}

/// Format SQL error with position highlighting
fn format_sql_error(prefix: &str, message: &str) -> String {
    // sqlparser format: "... at Line: X, Column Y"
    if let Some(pos) = extract_position(message) {
        format!(
            "{} at line {}, column {}:\n  {}",
            prefix, pos.line, pos.column, message
        )
    } else {
        format!("{}:\n  {}", prefix, message)
    }
}

struct SqlPosition {
    line:   usize,
    column: usize
}

fn extract_position(message: &str) -> Option<SqlPosition> {
    let line_marker = "Line: ";
    let col_marker = ", Column ";

    let line_start = message.find(line_marker)?;
    let line_num_start = line_start + line_marker.len();
    let col_start = message[line_num_start..].find(col_marker)?;
    let line_str = &message[line_num_start..line_num_start + col_start];
    let col_num_start = line_num_start + col_start + col_marker.len();

    let col_end = message[col_num_start..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(message.len() - col_num_start);
    let col_str = &message[col_num_start..col_num_start + col_end];

    match (line_str.parse(), col_str.parse()) {
        (Ok(line), Ok(column)) => Some(SqlPosition { line, column }),
        _ => None
    }
}

#[cfg(test)]
mod tests {
    use super::extract_position;

    #[test]
    fn extracts_line_and_column() {
        let pos = extract_position("Expected ) at Line: 3, Column 17").unwrap();
        assert_eq!(pos.line, 3);
        assert_eq!(pos.column, 17);
    }

    #[test]
    fn missing_marker_yields_none() {
        assert!(extract_position("unexpected end of input").is_none());
    }
}
