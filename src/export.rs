// export.rs
use actix_web::HttpResponse;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, XlsxError};

use crate::error::AppError;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const MIN_COLUMN_WIDTH: usize = 12;
const MAX_COLUMN_WIDTH: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn text(value: &str) -> Self {
        Cell::Text(value.to_string())
    }

    /// Missing values export as empty strings.
    pub fn opt(value: Option<&str>) -> Self {
        Cell::Text(value.unwrap_or_default().to_string())
    }

    fn display(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderStyle {
    #[default]
    Bold,
    /// Green fill, dark green text, centered and bordered.
    Highlighted,
}

#[derive(Debug, Clone)]
pub struct Table {
    pub sheet: &'static str,
    pub header: Vec<&'static str>,
    pub rows: Vec<Vec<Cell>>,
    pub header_style: HeaderStyle,
}

impl Table {
    pub fn new(sheet: &'static str, header: &[&'static str], rows: Vec<Vec<Cell>>) -> Self {
        Self {
            sheet,
            header: header.to_vec(),
            rows,
            header_style: HeaderStyle::Bold,
        }
    }

    pub fn highlighted(mut self) -> Self {
        self.header_style = HeaderStyle::Highlighted;
        self
    }

    /// clamp(longest value + 2, 12, 50) per column, in characters.
    pub fn column_widths(&self) -> Vec<usize> {
        self.header
            .iter()
            .enumerate()
            .map(|(col, h)| {
                let longest = self
                    .rows
                    .iter()
                    .filter_map(|r| r.get(col))
                    .map(|c| c.display().chars().count())
                    .chain(std::iter::once(h.chars().count()))
                    .max()
                    .unwrap_or(0);
                (longest + 2).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("xlsx") => Ok(ExportFormat::Xlsx),
            Some("csv") => Ok(ExportFormat::Csv),
            Some(other) => Err(AppError::validation(format!(
                "Format ekspor tidak dikenal: {}",
                other
            ))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }
}

fn csv_escape(value: &str) -> String {
    if value.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// UTF-8 CSV with BOM so spreadsheet apps pick the right encoding.
pub fn to_csv(table: &Table) -> String {
    let header = table
        .header
        .iter()
        .map(|h| csv_escape(h))
        .collect::<Vec<_>>()
        .join(",");
    let lines = table.rows.iter().map(|row| {
        row.iter()
            .map(|c| csv_escape(&c.display()))
            .collect::<Vec<_>>()
            .join(",")
    });

    let mut out = String::from('\u{feff}');
    out.push_str(
        &std::iter::once(header)
            .chain(lines)
            .collect::<Vec<_>>()
            .join("\n"),
    );
    out
}

fn header_format(style: HeaderStyle) -> Format {
    match style {
        HeaderStyle::Bold => Format::new().set_bold(),
        HeaderStyle::Highlighted => Format::new()
            .set_bold()
            .set_background_color(Color::RGB(0xE6F4EA))
            .set_font_color(Color::RGB(0x0B5C2B))
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_text_wrap()
            .set_border(FormatBorder::Thin)
            .set_border_color(Color::RGB(0xCCCCCC)),
    }
}

pub fn to_xlsx(table: &Table) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(table.sheet)?;

    let format = header_format(table.header_style);
    for (col, header) in table.header.iter().enumerate() {
        worksheet.write_with_format(0, col as u16, *header, &format)?;
    }

    for (idx, row) in table.rows.iter().enumerate() {
        let r = (idx + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                Cell::Text(s) => worksheet.write_string(r, col as u16, s)?,
                Cell::Number(n) => worksheet.write_number(r, col as u16, *n)?,
            };
        }
    }

    for (col, width) in table.column_widths().into_iter().enumerate() {
        worksheet.set_column_width(col as u16, width as f64)?;
    }

    if !table.header.is_empty() {
        let last_col = (table.header.len() - 1) as u16;
        worksheet.autofilter(0, 0, table.rows.len() as u32, last_col)?;
    }

    workbook.save_to_buffer()
}

/// Renders `table` and wraps it in an attachment response named `<base>.<ext>`.
pub fn download(table: &Table, format: ExportFormat, base_name: &str) -> Result<HttpResponse, AppError> {
    let file_name = format!(
        "{}.{}",
        sanitize_filename::sanitize(base_name),
        format.extension()
    );
    let disposition = format!("attachment; filename=\"{}\"", file_name);

    let response = match format {
        ExportFormat::Csv => HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .append_header(("Content-Disposition", disposition))
            .body(to_csv(table)),
        ExportFormat::Xlsx => HttpResponse::Ok()
            .content_type(XLSX_CONTENT_TYPE)
            .append_header(("Content-Disposition", disposition))
            .body(to_xlsx(table)?),
    };

    log::info!("Ekspor {} ({} baris)", file_name, table.rows.len());
    Ok(response)
}
