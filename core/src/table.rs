use crate::error::Error;
use crate::model::Machine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub label: &'static str,
    pub align: Align,
}

impl Column {
    pub const fn new(name: &'static str, label: &'static str, align: Align) -> Self {
        Self { name, label, align }
    }
}

/// A row that can be rendered cell by cell for a column name.
pub trait TableRow {
    fn cell(&self, column: &str) -> String;
}

pub const MACHINE_COLUMNS: [Column; 4] = [
    Column::new("id", "ID", Align::Left),
    Column::new("name", "Name", Align::Left),
    Column::new("wallet", "Wallet", Align::Left),
    Column::new("total", "Total sent/received", Align::Left),
];

impl TableRow for Machine {
    fn cell(&self, column: &str) -> String {
        match column {
            "id" => self.id.to_string(),
            "name" => self.name.clone(),
            "wallet" => self.wallet.clone(),
            "total" => self.total.to_string(),
            "lnurlpayamount" => self.lnurlpayamount.to_string(),
            "lnurlwithdrawamount" => self.lnurlwithdrawamount.to_string(),
            _ => String::new(),
        }
    }
}

/// Renders rows as CSV using the same columns the table shows.
///
/// Every cell is quoted, embedded quotes are doubled and records are
/// separated by CRLF.
pub fn export_csv<R: TableRow>(columns: &[Column], rows: &[R]) -> Result<String, Error> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer
        .write_record(columns.iter().map(|column| column.label))
        .map_err(encode_error)?;
    for row in rows {
        writer
            .write_record(columns.iter().map(|column| row.cell(column.name)))
            .map_err(encode_error)?;
    }
    let bytes = writer.into_inner().map_err(|err| Error::Encode {
        path: EXPORT_PATH.to_string(),
        details: err.to_string(),
    })?;
    let mut output = String::from_utf8(bytes).map_err(|err| Error::Encode {
        path: EXPORT_PATH.to_string(),
        details: err.to_string(),
    })?;
    if output.ends_with("\r\n") {
        output.truncate(output.len() - 2);
    }
    Ok(output)
}

const EXPORT_PATH: &str = "csv export";

fn encode_error(err: csv::Error) -> Error {
    Error::Encode {
        path: EXPORT_PATH.to_string(),
        details: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MachineId;

    #[test]
    fn export_uses_table_columns_and_quotes_cells() {
        let mut kiosk = Machine::new(MachineId::new("abc123"), "Kiosk \"A\"", "w1");
        kiosk.total = 2100;
        let lobby = Machine::new(MachineId::new("def456"), "Lobby", "w2");

        let csv = export_csv(&MACHINE_COLUMNS, &[kiosk, lobby]).expect("csv");
        let lines: Vec<&str> = csv.split("\r\n").collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "\"ID\",\"Name\",\"Wallet\",\"Total sent/received\"");
        assert_eq!(lines[1], "\"abc123\",\"Kiosk \"\"A\"\"\",\"w1\",\"2100\"");
        assert_eq!(lines[2], "\"def456\",\"Lobby\",\"w2\",\"0\"");
    }

    #[test]
    fn export_of_empty_list_is_header_only() {
        let csv = export_csv::<Machine>(&MACHINE_COLUMNS, &[]).expect("csv");
        assert!(!csv.contains("\r\n"));
        assert!(csv.starts_with("\"ID\""));
    }
}
