use super::{FormatParser, ParseRequest};
use crate::models::NormalizedItem;
use crate::pipeline::import::columns::{infer_columns, ColumnType, CsvOptions, ImportColumn};
use crate::pipeline::import::delimited::{cell, read_records};
use crate::pipeline::import::registry::{ImportFormat, CSV};
use crate::pipeline::import::source::RawFile;
use crate::pipeline::import::ImportError;

/// Generic delimited text, mapped through an [`ImportColumn`] list.
pub struct CsvParser {
    options: CsvOptions,
}

impl CsvParser {
    pub fn new(options: CsvOptions) -> Self {
        Self { options }
    }

    fn item_from_row(&self, row: &[String], columns: &[ImportColumn]) -> NormalizedItem {
        let name = columns
            .iter()
            .position(|c| c.inferred_type == ColumnType::Name)
            .map(|i| cell(row, Some(i)))
            .unwrap_or_default();
        let mut item = NormalizedItem::new(name);

        for (index, column) in columns.iter().enumerate() {
            let value = cell(row, Some(index));
            match column.inferred_type {
                ColumnType::Name | ColumnType::Skip => {}
                ColumnType::Tags => {
                    for tag in value.split(self.options.tag_separator) {
                        item.add_tag(tag);
                    }
                }
                ColumnType::Field(field_type) => item.push_value(&column.name, field_type, value),
            }
        }
        item
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new(CsvOptions::default())
    }
}

impl FormatParser for CsvParser {
    fn format(&self) -> &'static ImportFormat {
        &CSV
    }

    fn parse(
        &self,
        file: &RawFile,
        request: &ParseRequest<'_>,
    ) -> Result<Vec<NormalizedItem>, ImportError> {
        let inferred;
        let columns = match request.columns {
            Some(columns) => columns,
            None => {
                inferred = infer_columns(file, &self.options);
                inferred.as_slice()
            }
        };

        let rows = read_records(file, None)?;
        let data = if self.options.has_headers {
            rows.get(1..).unwrap_or_default()
        } else {
            &rows[..]
        };

        Ok(data
            .iter()
            .map(|row| self.item_from_row(row, columns))
            .collect())
    }
}
