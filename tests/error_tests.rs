// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use schema_guard::error::{
    config_error, file_read_error, file_write_error, forbidden_error, input_error, llm_api_error,
    schema_parse_error, serialization_error, snapshot_not_found, unauthorized_error
};

#[test]
fn test_input_error() {
    let error = input_error("SQL text is empty");
    let _msg = error.to_string();
}

#[test]
fn test_file_read_error() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error = file_read_error("/path/to/schema.json", io_error);
    let _msg = error.to_string();
}

#[test]
fn test_file_write_error() {
    let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let error = file_write_error("/path/to/store/u1/crm.json", io_error);
    let _msg = error.to_string();
}

#[test]
fn test_schema_parse_error() {
    let error = schema_parse_error("Invalid syntax");
    let _msg = error.to_string();
}

#[test]
fn test_schema_parse_error_with_position() {
    let error = schema_parse_error("Expected identifier at Line: 1, Column 14");
    let _msg = error.to_string();
}

#[test]
fn test_snapshot_not_found() {
    let error = snapshot_not_found("crm");
    let _msg = error.to_string();
}

#[test]
fn test_unauthorized_error() {
    let error = unauthorized_error("invalid_jwt");
    let _msg = error.to_string();
}

#[test]
fn test_forbidden_error() {
    let error = forbidden_error("ROLE_NOT_CATALOG_ONLY");
    let _msg = error.to_string();
}

#[test]
fn test_llm_api_error() {
    let error = llm_api_error("Rate limit exceeded");
    let _msg = error.to_string();
}

#[test]
fn test_config_error() {
    let error = config_error("Invalid TOML");
    let _msg = error.to_string();
}

#[test]
fn test_serialization_error() {
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error = serialization_error(json_error);
    let _msg = error.to_string();
}
