// src/common/csv_rows.rs

use csv::{ReaderBuilder, Trim};

use crate::common::error::AppError;

/// Uma linha da planilha `number[,status]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberRow {
    pub number: String,
    pub status: Option<String>,
}

/// Lê a planilha de duas colunas. Linhas vazias são ignoradas e um cabeçalho
/// (`number`, `phone`, `numero`) na primeira linha é descartado.
pub fn parse_number_rows(content: &str) -> Result<Vec<NumberRow>, AppError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();

    for (index, record) in reader.records().enumerate() {
        let record = record?;

        let number = record.get(0).unwrap_or("").to_string();
        if number.is_empty() {
            continue;
        }

        if index == 0 && is_header(&number) {
            continue;
        }

        let status = record
            .get(1)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        rows.push(NumberRow { number, status });
    }

    Ok(rows)
}

fn is_header(cell: &str) -> bool {
    matches!(
        cell.to_ascii_lowercase().as_str(),
        "number" | "numbers" | "phone" | "numero" | "número"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_numbers_with_and_without_status() {
        let rows = parse_number_rows("0501234567,BLOCKED\n0507654321\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status.as_deref(), Some("BLOCKED"));
        assert_eq!(rows[1].number, "0507654321");
        assert_eq!(rows[1].status, None);
    }

    #[test]
    fn header_and_blank_lines_are_skipped() {
        let rows = parse_number_rows("number,status\n\n 0501234567 , UNBLOCKED \n,\n").unwrap();
        assert_eq!(
            rows,
            vec![NumberRow {
                number: "0501234567".into(),
                status: Some("UNBLOCKED".into())
            }]
        );
    }

    #[test]
    fn header_is_only_detected_on_first_line() {
        let rows = parse_number_rows("0501234567\nnumber\n").unwrap();
        assert_eq!(rows.len(), 2);
    }
}
