//! Engine configuration and per-language number/date formats.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Compile expressions with the sandbox check.
    pub sandboxed: bool,
    /// Maximum nesting of `t-call`; deeper calls fail with `RecursionLimit`.
    pub max_call_depth: usize,
    /// Values seeded into every render before the caller's values.
    pub default_values: serde_json::Map<String, serde_json::Value>,
    /// Languages in addition to the built-in `en_US`.
    pub languages: Vec<LangFormat>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sandboxed: false,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            default_values: serde_json::Map::new(),
            languages: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }
}

/// Number and date conventions of a language.
///
/// `grouping` lists digit group sizes from the right; a trailing `0` repeats
/// the previous size, so `[3, 0]` groups by thousands and `[3, 2, 0]` gives
/// Indian-style grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LangFormat {
    pub code: String,
    pub decimal_point: String,
    pub thousands_sep: String,
    pub grouping: Vec<usize>,
    pub date_format: String,
    pub time_format: String,
}

impl Default for LangFormat {
    fn default() -> Self {
        Self {
            code: "en_US".to_string(),
            decimal_point: ".".to_string(),
            thousands_sep: ",".to_string(),
            grouping: vec![3, 0],
            date_format: "%m/%d/%Y".to_string(),
            time_format: "%H:%M:%S".to_string(),
        }
    }
}

impl LangFormat {
    /// Inserts `thousands_sep` into a string of digits.
    pub fn group_digits(&self, digits: &str) -> String {
        if self.thousands_sep.is_empty() || self.grouping.is_empty() {
            return digits.to_string();
        }
        let chars: Vec<char> = digits.chars().collect();
        let mut groups: Vec<String> = Vec::new();
        let mut end = chars.len();
        let mut sizes = self.grouping.iter().copied();
        let mut size = 0;
        while end > 0 {
            size = match sizes.next() {
                Some(0) | None if size > 0 => size,
                Some(0) | None => break,
                Some(s) => s,
            };
            if end <= size {
                break;
            }
            groups.push(chars[end - size..end].iter().collect());
            end -= size;
        }
        groups.push(chars[..end].iter().collect());
        groups.reverse();
        groups.join(&self.thousands_sep)
    }

    /// Formats `value` with `precision` decimals, grouped thousands and the
    /// language's decimal point.
    pub fn format_number(&self, value: f64, precision: usize) -> String {
        let raw = format!("{:.*}", precision, value.abs());
        let negative = value < 0.0 && raw.chars().any(|c| c.is_ascii_digit() && c != '0');
        self.format_decimal_str(&raw, negative)
    }

    /// Same as [`format_number`](Self::format_number) for an already rendered
    /// unsigned decimal string such as `"1234.50"`.
    pub fn format_decimal_str(&self, unsigned: &str, negative: bool) -> String {
        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (unsigned, None),
        };
        let mut out = String::new();
        if negative {
            out.push('-');
        }
        out.push_str(&self.group_digits(int_part));
        if let Some(frac) = frac_part {
            out.push_str(&self.decimal_point);
            out.push_str(frac);
        }
        out
    }
}
