// src/export.rs
// CSV output of filter value sets

use std::io::{self, Write};

use crate::filters::FilterValueSet;

/// Quote `field` when it holds a comma, a double quote, a line break, or
/// surrounding whitespace. Embedded quotes are doubled.
pub fn escape_csv_field(field: &str) -> String {
    let needs_quotes = field.contains([',', '"', '\r', '\n'])
        || field.starts_with(char::is_whitespace)
        || field.ends_with(char::is_whitespace);
    if needs_quotes {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn format_csv_row<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|field| escape_csv_field(field.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// One `filter,value,selected` row per selectable value.
pub fn write_filter_values_csv<W: Write>(writer: &mut W, sets: &[FilterValueSet]) -> io::Result<()> {
    writeln!(writer, "{}", format_csv_row(&["filter", "value", "selected"]))?;
    for set in sets {
        for value in &set.values {
            let selected = if set.is_selected(value) { "true" } else { "false" };
            writeln!(
                writer,
                "{}",
                format_csv_row(&[set.filter_code.as_str(), value.as_str(), selected])
            )?;
        }
    }
    Ok(())
}
