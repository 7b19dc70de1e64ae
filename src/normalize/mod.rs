use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static CASE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,5})/(\d{4})$").expect("invalid case number regex"));

/// Canonicalize a case number into `NNNNN/YYYY` form.
///
/// The input must be a `1-5 digits '/' exactly 4 digits` shape after trimming;
/// the numeric prefix is left-padded to five digits. Anything else is
/// rejected with `None`. Total over strings, no partial matches.
pub fn normalize_case_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let caps = CASE_NUMBER_RE.captures(trimmed)?;
    Some(format!("{:0>5}/{}", &caps[1], &caps[2]))
}

/// Read-once snapshot of the court-name alias table.
///
/// Raw spellings map many-to-one onto canonical court names. Lookups are
/// case-sensitive on the raw form as stored; an unknown raw name passes
/// through unchanged so matching simply fails to find it rather than erroring.
#[derive(Debug, Clone, Default)]
pub struct AliasMap {
    aliases: HashMap<String, String>,
}

impl AliasMap {
    pub fn new(aliases: HashMap<String, String>) -> Self {
        Self { aliases }
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            aliases: pairs.into_iter().collect(),
        }
    }

    /// Resolve a raw court name to its canonical form.
    pub fn resolve<'a>(&'a self, raw: &'a str) -> &'a str {
        self.aliases.get(raw).map(String::as_str).unwrap_or(raw)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Normalize free text for name matching: uppercase, fold Spanish
/// diacritics (Ñ included, bulletins are OCR-degraded and spell it both
/// ways), collapse whitespace.
pub fn normalize_search_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for ch in text.chars() {
        let folded = match ch {
            'á' | 'à' | 'ä' | 'Á' | 'À' | 'Ä' => 'A',
            'é' | 'è' | 'ë' | 'É' | 'È' | 'Ë' => 'E',
            'í' | 'ì' | 'ï' | 'Í' | 'Ì' | 'Ï' => 'I',
            'ó' | 'ò' | 'ö' | 'Ó' | 'Ò' | 'Ö' => 'O',
            'ú' | 'ù' | 'ü' | 'Ú' | 'Ù' | 'Ü' => 'U',
            'ñ' | 'Ñ' => 'N',
            c => c.to_ascii_uppercase(),
        };
        if folded.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(folded);
            last_was_space = false;
        }
    }
    out.trim_end().to_string()
}
