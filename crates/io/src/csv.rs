// CSV source decoding and report encoding

use std::io::Read;
use std::path::Path;

use referral_recon::Table;

/// Decode a source file into a table named `name`, sniffing the delimiter.
pub fn import(path: &Path, name: &str) -> Result<Table, ImportError> {
    let content = read_file_as_utf8(path).map_err(ImportError::Read)?;
    let delimiter = sniff_delimiter(&content);
    Table::from_delimited_str(name, &content, delimiter).map_err(|e| ImportError::Parse(e.to_string()))
}

/// Why a source file could not become a table.
#[derive(Debug)]
pub enum ImportError {
    Read(std::io::Error),
    Parse(String),
}

/// Delimiters tried for source files, in tie-break order.
const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Data rows checked against the header when sniffing.
const SNIFF_ROWS: usize = 8;

/// Number of fields `line` splits into under `delimiter`, honouring quotes.
fn field_count(line: &str, delimiter: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(|r| r.ok())
        .map_or(1, |r| r.len())
}

/// Pick the delimiter for a source file from its header row.
///
/// A candidate must split the header into more than one column. Among those, the
/// one that gives the most sample rows the header's width wins, then the one with
/// more columns, then the earlier entry in [`DELIMITERS`]. Anything else is comma.
pub fn sniff_delimiter(content: &str) -> u8 {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return b',';
    };
    let sample: Vec<&str> = lines.take(SNIFF_ROWS).collect();

    DELIMITERS
        .iter()
        .enumerate()
        .filter_map(|(rank, &delim)| {
            let width = field_count(header, delim);
            let agreeing = sample.iter().filter(|l| field_count(l, delim) == width).count();
            (width > 1).then_some((agreeing, width, std::cmp::Reverse(rank), delim))
        })
        .max()
        .map_or(b',', |(_, _, _, delim)| delim)
}

/// Read file and convert to UTF-8 if needed (Windows-1252 exports from spreadsheets).
/// A leading byte-order mark is dropped.
pub fn read_file_as_utf8(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };

    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

/// Write a table to `path` as comma-separated UTF-8.
pub fn export(table: &Table, path: &Path) -> Result<(), String> {
    let content = table.to_csv_string().map_err(|e| e.to_string())?;
    std::fs::write(path, content).map_err(|e| e.to_string())
}
