//! services/recipient_loader.rs
//! Parser tolerante de listas delimitadas (CSV). La primera fila define los campos.

use std::collections::HashMap;

use crate::models::recipient_model::Recipient;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListError {
    /// No quedó ninguna fila de datos.
    #[error("Recipient list has no data rows")]
    EmptyList,
    /// Comillas sin cerrar; `line` es donde se abrieron (1-based).
    #[error("Recipient list is malformed: unterminated quote opened on line {line}")]
    MalformedInput { line: usize },
}

/// Parsea el texto completo de la lista.
pub fn parse_recipients(raw: &str) -> Result<Vec<Recipient>, ListError> {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let delimiter = detect_delimiter(text);
    let mut rows = tokenize(text, delimiter)?.into_iter();

    let header: Vec<String> = match rows.next() {
        Some(h) => h.iter().map(|name| clean_value(name)).collect(),
        None => return Err(ListError::EmptyList),
    };

    let recipients: Vec<Recipient> = rows
        .map(|row| {
            // Filas cortas: los campos faltantes quedan ausentes.
            // Columnas de más (sin cabecera) se ignoran.
            let fields: HashMap<String, String> = header
                .iter()
                .zip(row.iter())
                .filter(|(name, _)| !name.is_empty())
                .map(|(name, value)| (name.clone(), clean_value(value)))
                .collect();
            Recipient::new(fields)
        })
        .collect();

    if recipients.is_empty() {
        return Err(ListError::EmptyList);
    }
    Ok(recipients)
}

/// ',' por defecto; ';' o tab si la cabecera no tiene comas.
fn detect_delimiter(text: &str) -> char {
    let header = text.lines().next().unwrap_or("");
    if header.contains(',') {
        ','
    } else if header.contains(';') {
        ';'
    } else if header.contains('\t') {
        '\t'
    } else {
        ','
    }
}

fn clean_value(value: &str) -> String {
    value
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

/// Separa en filas y campos respetando comillas dobles ("" es una comilla literal).
/// Las líneas en blanco se descartan.
fn tokenize(text: &str, delimiter: char) -> Result<Vec<Vec<String>>, ListError> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quote_line = 0;
    let mut line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                in_quotes = true;
                quote_line = line;
            }
            c if c == delimiter => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                line += 1;
                row.push(std::mem::take(&mut field));
                push_row(&mut rows, std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(ListError::MalformedInput { line: quote_line });
    }

    row.push(field);
    push_row(&mut rows, row);
    Ok(rows)
}

fn push_row(rows: &mut Vec<Vec<String>>, row: Vec<String>) {
    if row.iter().any(|f| !f.trim().is_empty()) {
        rows.push(row);
    }
}
