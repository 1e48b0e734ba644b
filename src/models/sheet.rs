use serde::{Deserialize, Serialize};

/// One spreadsheet cell, resolved to a typed value at the ingestion boundary.
/// The file collaborator (spreadsheet/CSV reader) produces these; nothing
/// downstream deals with untyped values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCell {
    Number(f64),
    Text(String),
    Empty,
}

impl RawCell {
    /// Trimmed, non-empty textual form of the cell.
    pub fn text(&self) -> Option<String> {
        match self {
            RawCell::Number(n) => Some(format!("{}", n)),
            RawCell::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    None
                } else {
                    Some(t.to_string())
                }
            }
            RawCell::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text().is_none()
    }
}

/// One worksheet (or CSV segment) as a 2-D grid of cells. No header row is
/// assumed; locating one is the column-inference module's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<RawCell>>,
}

/// A whole uploaded price file, already split into sheets by the file
/// collaborator (encoding and delimiter detection happen there).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFile {
    pub filename: String,
    pub sheets: Vec<Sheet>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_cell_deserializes_from_mixed_json() {
        let row: Vec<RawCell> = serde_json::from_str(r#"["Сыр", 500, null, "  "]"#).unwrap();
        assert_eq!(row[0].text().as_deref(), Some("Сыр"));
        assert_eq!(row[1], RawCell::Number(500.0));
        assert_eq!(row[1].text().as_deref(), Some("500"));
        assert!(row[2].is_empty());
        assert!(row[3].is_empty());
    }
}
