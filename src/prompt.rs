//! Instruction text for the language model.

/// Dialect used when the caller does not name one
pub const DEFAULT_DIALECT: &str = "postgres";

/// System instruction for SQL generation in `dialect`.
///
/// ```
/// use schema_guard::prompt::build_system_prompt;
///
/// let prompt = build_system_prompt("mysql");
/// assert!(prompt.contains("MYSQL"));
/// assert!(prompt.contains("markdown"));
/// ```
pub fn build_system_prompt(dialect: &str) -> String {
    [
        "You are an expert SQL generator.",
        &format!("Current SQL dialect: {}.", dialect_label(dialect)),
        "Return exactly one valid SQL statement and nothing else: no explanations, no markdown fences.",
        "Use only tables and columns that appear in the provided schema; never invent names.",
        "Qualify columns with their table name or alias when more than one table is involved.",
        "Do not produce data-modifying or DDL statements (DROP, DELETE, ALTER, UPDATE, INSERT, ...) unless the request explicitly asks for them."
    ]
    .join(" ")
}

/// User message carrying the schema text and the natural-language request
pub fn build_user_prompt(request: &str, schema_text: &str, dialect: &str) -> String {
    let schema_text = match schema_text.trim() {
        "" => "(empty)",
        text => text
    };
    format!(
        "You are an SQL assistant.\n\
         Generate an SQL query for the {dialect} dialect.\n\
         Database schema:\n\
         {schema}\n\
         User request:\n\
         \"{request}\"",
        dialect = dialect_label(dialect),
        schema = schema_text,
        request = request.trim()
    )
}

fn dialect_label(dialect: &str) -> String {
    match dialect.trim() {
        "" => DEFAULT_DIALECT.to_uppercase(),
        name => name.to_uppercase()
    }
}
