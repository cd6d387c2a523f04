use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// A command result that can be shown in every output format.
pub trait Render: Serialize {
    /// Field/value pairs for table and pretty output.
    fn fields(&self) -> Vec<(&'static str, String)>;

    /// The single most useful value, for raw output.
    fn raw(&self) -> String;
}

pub fn print<T: Render>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (name, value) in value.fields() {
                table.add_row(vec![name.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let fields = value.fields();
            let width = fields.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
            for (name, value) in fields {
                println!("{name:.<width$}..: {value}", width = width);
            }
        }
        OutputFormat::Raw => println!("{}", value.raw()),
    }
}

/// One row per item, columns from [`Render::fields`] of the first item.
pub fn print_rows<T: Render>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let Some(first) = items.first() else {
                return;
            };
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(
                    first
                        .fields()
                        .into_iter()
                        .map(|(name, _)| name.to_uppercase())
                        .collect::<Vec<_>>(),
                );
            for item in items {
                table.add_row(item.fields().into_iter().map(|(_, v)| v).collect::<Vec<_>>());
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for item in items {
                let line = item
                    .fields()
                    .into_iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("{line}");
            }
        }
        OutputFormat::Raw => {
            for item in items {
                println!("{}", item.raw());
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Bytes as space separated hex pairs.
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_pairs() {
        assert_eq!(hex(&[0x00, 0xab, 0x10]), "00 ab 10");
        assert_eq!(hex(&[]), "");
    }
}
