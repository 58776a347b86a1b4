//! Roster CSV reader.
//!
//! Header row required. Missing mandatory columns abort the run; everything
//! else about a row is validated later, one row at a time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::{normalize_login, RosterRecord};

/// UTF-8 BOM bytes.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Columns every roster must carry.
pub const MANDATORY_COLUMNS: [&str; 6] =
    ["login", "action", "role", "muf", "first_name", "last_name"];

pub const SSO_PROVIDER_COLUMN: &str = "sso_provider";

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("could not read roster {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Column {column} is missing from the .csv file.")]
    MissingColumn { column: &'static str },

    #[error("malformed roster at line {line}: {message}")]
    Malformed { line: u64, message: String },
}

/// Read every record of a roster file, in file order.
pub fn read_roster_file(path: impl AsRef<Path>) -> Result<Vec<RosterRecord>, RosterError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| RosterError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_roster(&data)
}

fn strip_utf8_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(UTF8_BOM) {
        &data[UTF8_BOM.len()..]
    } else {
        data
    }
}

/// Parse roster CSV from raw bytes.
pub fn parse_roster(data: &[u8]) -> Result<Vec<RosterRecord>, RosterError> {
    let data = strip_utf8_bom(data);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers: HashMap<String, usize> = reader
        .headers()
        .map_err(|e| RosterError::Malformed {
            line: 1,
            message: e.to_string(),
        })?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_string(), i))
        .collect();

    let mut columns = [0usize; 6];
    for (slot, column) in columns.iter_mut().zip(MANDATORY_COLUMNS) {
        *slot = *headers
            .get(column)
            .ok_or(RosterError::MissingColumn { column })?;
    }
    let [login, action, role, muf, first_name, last_name] = columns;
    let sso_provider = headers.get(SSO_PROVIDER_COLUMN).copied();

    let mut records = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let line_number = index as u64 + 2;
        let record = result.map_err(|e| RosterError::Malformed {
            line: line_number,
            message: e.to_string(),
        })?;
        let field = |i: usize| record.get(i).unwrap_or_default().to_string();

        records.push(RosterRecord {
            line_number,
            login: normalize_login(&field(login)),
            action: field(action),
            role: field(role),
            muf: field(muf),
            first_name: field(first_name),
            last_name: field(last_name),
            sso_provider: sso_provider
                .map(field)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "login,action,role,muf,first_name,last_name";

    #[test]
    fn test_parses_rows_in_order() {
        let csv = format!(
            "{HEADER}\n Alice@Example.com ,ENABLE,editor,[],Alice,A\nbob@example.com,DISABLE,admin,\"[{{\"\"attribute\"\":\"\"a\"\"}}]\",Bob,B\n"
        );
        let rows = parse_roster(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].login, "alice@example.com");
        assert_eq!(rows[0].line_number, 2);
        assert_eq!(rows[0].sso_provider, None);
        assert_eq!(rows[1].muf, r#"[{"attribute":"a"}]"#);
        assert_eq!(rows[1].line_number, 3);
    }

    #[test]
    fn test_strips_bom_and_reads_sso_provider() {
        let mut csv = vec![0xEF, 0xBB, 0xBF];
        csv.extend_from_slice(
            format!("{HEADER},sso_provider\nx@example.com,INVITE,editor,[],X,Y,okta.example.com\ny@example.com,INVITE,editor,[],Y,Z,\n").as_bytes(),
        );
        let rows = parse_roster(&csv).unwrap();
        assert_eq!(rows[0].sso_provider.as_deref(), Some("okta.example.com"));
        assert_eq!(rows[1].sso_provider, None);
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let err = parse_roster(b"login,action,role,first_name,last_name\na,ENABLE,editor,A,B\n")
            .unwrap_err();
        assert!(matches!(err, RosterError::MissingColumn { column: "muf" }));
    }

    #[test]
    fn test_read_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "c@example.com,REMOVE,explorer,[],C,D").unwrap();

        let rows = read_roster_file(file.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, "REMOVE");
    }

    #[test]
    fn test_missing_file() {
        let err = read_roster_file("/nonexistent/roster.csv").unwrap_err();
        assert!(matches!(err, RosterError::Io { .. }));
    }
}
