//! Bulletin markup parser.
//!
//! The source documents carry no structural tags separating court sections:
//! headers and case rows are distinguished visually only. Parsing is
//! therefore a two-pass segmentation over a flat sequence of block nodes:
//! first classify every text block as header/non-header with a pure
//! predicate, then partition the tables between consecutive headers and scan
//! their rows for case-number-shaped columns.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

/// One parsed case mention, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    /// Court section the entry appeared under (cleaned header text)
    pub court: String,
    /// Case number as printed, `1-5 digits / 4 digits`
    pub case_number: String,
    /// Whitespace-normalized free-text detail from the remaining columns
    pub detail: String,
}

/// A block-level node in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    Text(String),
    Table(Vec<Vec<String>>),
}

static TABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<table[^>]*>.*?</table>").expect("invalid table regex"));
static ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").expect("invalid row regex"));
static CELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<t[dh][^>]*>(.*?)</t[dh]>").expect("invalid cell regex"));
static BLOCK_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?(?:p|div|h[1-6]|br|li|center|section)[^>]*>")
        .expect("invalid block tag regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("invalid tag regex"));
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#\d+|[A-Za-z]+);").expect("invalid entity regex"));

static CASE_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,5}/\d{4}$").expect("invalid case shape regex"));
static CASE_SHAPE_ANYWHERE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,5}/\d{4}").expect("invalid case shape regex"));

static TRAILING_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[,;.]?\s*(?:A\s+)?\d{1,2}\s+DE\s+[A-ZÁÉÍÓÚÜÑ]+\s+DE\s+\d{4}\s*\.?$")
        .expect("invalid trailing date regex")
});
static TRAILING_NUMERIC_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[,;.]?\s*\d{1,2}/\d{1,2}/\d{2,4}\s*\.?$").expect("invalid numeric date regex")
});
static TRAILING_ABBREV_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[,;]?\s*(?:QRO\.?|S\.\s?J\.\s?R\.?|CAD\.?|AME\.?)$")
        .expect("invalid abbrev regex")
});

/// Court/tribunal/chamber keywords a header must contain.
const COURT_KEYWORDS: &[&str] = &["JUZGADO", "TRIBUNAL", "SALA"];

/// Place names the archive's courts sit in. A header must name one.
const PLACE_NAMES: &[&str] = &[
    "QUERETARO",
    "SAN JUAN DEL RIO",
    "CADEREYTA",
    "AMEALCO",
    "JALPAN",
    "TOLIMAN",
    "TEQUISQUIAPAN",
    "CORREGIDORA",
    "EL MARQUES",
];

/// Case captions never span more than this; longer blocks are narrative text.
const HEADER_LENGTH_CEILING: usize = 160;

/// Parse one decoded bulletin document into ordered case entries.
pub fn parse_bulletin(html: &str) -> Vec<ParsedEntry> {
    let blocks = tokenize(html);
    let mut entries = Vec::new();
    let mut current_court: Option<String> = None;

    for block in blocks {
        match block {
            Block::Text(text) => {
                if is_court_header(&text) {
                    current_court = Some(clean_header(&text));
                }
            }
            Block::Table(rows) => {
                let Some(court) = current_court.as_deref() else {
                    // Tables before the first header are front-matter noise.
                    continue;
                };
                for row in rows {
                    if let Some(entry) = entry_from_row(court, &row) {
                        entries.push(entry);
                    }
                }
            }
        }
    }

    debug!("parsed {} entries from bulletin document", entries.len());
    entries
}

/// Classify a block of text as a court-section header.
///
/// A header contains a court keyword and a recognized place name, and does
/// not look like a case caption: no party-vs-party marker, no amparo notice,
/// no case-number-shaped substring, and bounded length.
pub fn is_court_header(text: &str) -> bool {
    let upper = crate::normalize::normalize_search_text(text);
    if upper.is_empty() || upper.len() > HEADER_LENGTH_CEILING {
        return false;
    }
    if !COURT_KEYWORDS.iter().any(|kw| upper.contains(kw)) {
        return false;
    }
    if !PLACE_NAMES.iter().any(|place| upper.contains(place)) {
        return false;
    }
    if upper.contains(" VS ") || upper.contains(" VS.") || upper.contains("AMPARO") {
        return false;
    }
    if CASE_SHAPE_ANYWHERE_RE.is_match(&upper) {
        return false;
    }
    true
}

/// Strip trailing date fragments and jurisdiction abbreviations from an
/// accepted header, collapsing whitespace.
pub fn clean_header(text: &str) -> String {
    let mut cleaned = collapse_whitespace(text);
    loop {
        let before = cleaned.len();
        cleaned = TRAILING_DATE_RE.replace(&cleaned, "").into_owned();
        cleaned = TRAILING_NUMERIC_DATE_RE.replace(&cleaned, "").into_owned();
        cleaned = TRAILING_ABBREV_RE.replace(&cleaned, "").into_owned();
        cleaned = cleaned
            .trim_end_matches([' ', ',', ';', '.'])
            .to_string();
        if cleaned.len() == before {
            break;
        }
    }
    cleaned.trim().to_string()
}

/// Extract a case entry from one table row, if it qualifies: at least two
/// columns, one of them case-number shaped. Rows that do not qualify are
/// expected noise (continuation rows, column headings) and are dropped.
fn entry_from_row(court: &str, row: &[String]) -> Option<ParsedEntry> {
    if row.len() < 2 {
        return None;
    }
    let case_idx = row
        .iter()
        .position(|cell| CASE_SHAPE_RE.is_match(cell.trim()))?;
    let case_number = row[case_idx].trim().to_string();
    let detail = row
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != case_idx)
        .map(|(_, cell)| cell.trim())
        .filter(|cell| !cell.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    Some(ParsedEntry {
        court: court.to_string(),
        case_number,
        detail: collapse_whitespace(&detail),
    })
}

/// Tokenize raw markup into an ordered flat sequence of text and table
/// blocks. Regions between tables are split on block-level tags; tables are
/// split row by row, cell by cell. Document order is preserved so headers
/// pair with the tables that follow them.
fn tokenize(html: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut cursor = 0;

    for table_match in TABLE_RE.find_iter(html) {
        push_text_blocks(&html[cursor..table_match.start()], &mut blocks);
        blocks.push(Block::Table(parse_table(table_match.as_str())));
        cursor = table_match.end();
    }
    push_text_blocks(&html[cursor..], &mut blocks);

    blocks
}

fn push_text_blocks(fragment: &str, blocks: &mut Vec<Block>) {
    for piece in BLOCK_TAG_RE.split(fragment) {
        let text = clean_fragment(piece);
        if !text.is_empty() {
            blocks.push(Block::Text(text));
        }
    }
}

fn parse_table(table_html: &str) -> Vec<Vec<String>> {
    ROW_RE
        .captures_iter(table_html)
        .map(|row| {
            CELL_RE
                .captures_iter(&row[1])
                .map(|cell| clean_fragment(&cell[1]))
                .collect()
        })
        .collect()
}

/// Strip tags, decode entities and collapse whitespace in one text fragment.
fn clean_fragment(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, " ");
    let decoded = decode_entities(&stripped);
    collapse_whitespace(&decoded)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode the entity vocabulary these bulletins actually use. Unknown
/// entities pass through untouched.
fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            if let Some(num) = name.strip_prefix('#') {
                return num
                    .parse::<u32>()
                    .ok()
                    .and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_else(|| caps[0].to_string());
            }
            match name {
                "amp" => "&".to_string(),
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "quot" => "\"".to_string(),
                "nbsp" => " ".to_string(),
                "aacute" => "á".to_string(),
                "eacute" => "é".to_string(),
                "iacute" => "í".to_string(),
                "oacute" => "ó".to_string(),
                "uacute" => "ú".to_string(),
                "ntilde" => "ñ".to_string(),
                "uuml" => "ü".to_string(),
                "Aacute" => "Á".to_string(),
                "Eacute" => "É".to_string(),
                "Iacute" => "Í".to_string(),
                "Oacute" => "Ó".to_string(),
                "Uacute" => "Ú".to_string(),
                "Ntilde" => "Ñ".to_string(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_header_predicate_accepts_court_lines() {
        assert!(is_court_header(
            "JUZGADO PRIMERO DE LO CIVIL, QUERÉTARO, QRO."
        ));
        assert!(is_court_header("SALA PENAL, SAN JUAN DEL RÍO"));
        assert!(is_court_header("TRIBUNAL DE JUSTICIA ADMINISTRATIVA DE QUERETARO"));
    }

    #[test]
    fn test_header_predicate_rejects_captions() {
        // party-vs-party caption
        assert!(!is_court_header(
            "PEREZ LOPEZ JUAN VS JUZGADO PRIMERO QUERETARO"
        ));
        // amparo notice
        assert!(!is_court_header("AMPARO ANTE EL TRIBUNAL DE QUERETARO"));
        // case-number-shaped substring
        assert!(!is_court_header("JUZGADO PRIMERO QUERETARO EXP 342/2025"));
        // missing place name
        assert!(!is_court_header("JUZGADO PRIMERO DE LO CIVIL"));
        // missing court keyword
        assert!(!is_court_header("CIUDAD DE QUERETARO"));
        // over the length ceiling
        let long = format!("JUZGADO QUERETARO {}", "X".repeat(200));
        assert!(!is_court_header(&long));
    }

    #[test]
    fn test_clean_header_strips_dates_and_abbrevs() {
        assert_eq!(
            clean_header("JUZGADO PRIMERO DE LO CIVIL, QUERÉTARO, QRO., 12 DE ENERO DE 2025"),
            "JUZGADO PRIMERO DE LO CIVIL, QUERÉTARO"
        );
        assert_eq!(
            clean_header("SALA PENAL SAN JUAN DEL RÍO, S.J.R."),
            "SALA PENAL SAN JUAN DEL RÍO"
        );
        assert_eq!(
            clean_header("JUZGADO  MIXTO   CADEREYTA 07/03/2025"),
            "JUZGADO MIXTO CADEREYTA"
        );
    }

    #[test]
    fn test_parse_pairs_headers_with_following_tables() {
        let html = r#"
            <html><body>
            <p>JUZGADO PRIMERO DE LO CIVIL, QUER&Eacute;TARO, QRO.</p>
            <table>
              <tr><td>EXPEDIENTE</td><td>ACUERDO</td></tr>
              <tr><td>342/2025</td><td>SE TIENE POR PRESENTADO ESCRITO</td></tr>
              <tr><td>7/2024</td><td>AUTO DE RADICACI&oacute;N</td></tr>
            </table>
            <p>SALA PENAL, SAN JUAN DEL R&Iacute;O</p>
            <table>
              <tr><td>15/2023</td><td>SENTENCIA DEFINITIVA</td></tr>
            </table>
            </body></html>
        "#;
        let entries = parse_bulletin(html);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].court, "JUZGADO PRIMERO DE LO CIVIL, QUERÉTARO");
        assert_eq!(entries[0].case_number, "342/2025");
        assert_eq!(entries[0].detail, "SE TIENE POR PRESENTADO ESCRITO");
        assert_eq!(entries[1].detail, "AUTO DE RADICACIóN");
        assert_eq!(entries[2].court, "SALA PENAL, SAN JUAN DEL RÍO");
        assert_eq!(entries[2].case_number, "15/2023");
    }

    #[test]
    fn test_malformed_rows_are_dropped() {
        let html = r#"
            <p>JUZGADO MIXTO, CADEREYTA</p>
            <table>
              <tr><td>NO-CASE</td><td>TEXT</td></tr>
              <tr><td>99/2020</td></tr>
              <tr><td>55/2021</td><td>OK</td></tr>
            </table>
        "#;
        let entries = parse_bulletin(html);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].case_number, "55/2021");
    }

    #[test]
    fn test_tables_before_first_header_ignored() {
        let html = r#"
            <table><tr><td>10/2020</td><td>FRONT MATTER</td></tr></table>
            <p>JUZGADO MIXTO, AMEALCO</p>
            <table><tr><td>11/2020</td><td>REAL</td></tr></table>
        "#;
        let entries = parse_bulletin(html);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].detail, "REAL");
    }

    #[test]
    fn test_case_number_column_position_flexible() {
        let html = r#"
            <p>JUZGADO MIXTO, TOLIMÁN QUERÉTARO</p>
            <table><tr><td>ACTOR VS DEMANDADO</td><td>123/2019</td><td>NOTIFICACION</td></tr></table>
        "#;
        let entries = parse_bulletin(html);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].case_number, "123/2019");
        assert_eq!(entries[0].detail, "ACTOR VS DEMANDADO NOTIFICACION");
    }

    #[test]
    fn test_decode_entities_spanish() {
        assert_eq!(decode_entities("QUER&Eacute;TARO"), "QUERÉTARO");
        assert_eq!(decode_entities("PE&Ntilde;A"), "PEÑA");
        assert_eq!(decode_entities("&#193;LVAREZ"), "ÁLVAREZ");
        assert_eq!(decode_entities("A&zzz;B"), "A&zzz;B");
    }
}
