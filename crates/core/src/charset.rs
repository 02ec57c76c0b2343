//! Character-reference conversion for narrow storage charsets.
//!
//! Legacy 3-byte `utf8` database configurations cannot store
//! supplementary-plane characters (emoji and friends). This module maps a
//! curated set of characters to numeric character references and back, and
//! converts any remaining 4-byte character to a reference computed from its
//! codepoint. The curated table is a bijection only within itself; outside
//! it, encoding goes through the generic codepoint path and decoding through
//! standard reference decoding, so round trips still preserve the character.

use std::sync::Arc;

use anyhow::Result;

use crate::store::{ContentStore, VariableStore};

/// Curated character-to-reference table.
///
/// Carried over verbatim from the deployed mapping, including its
/// historical quirks (the red heart maps to `&#10764;`); both directions use
/// the same pairs, so table round trips are unaffected.
static DEFAULT_TABLE: &[(&str, &str)] = &[
    // Emoji - People & Body
    ("😀", "&#128512;"),
    ("😁", "&#128513;"),
    ("😂", "&#128514;"),
    ("🤣", "&#129315;"),
    ("😃", "&#128515;"),
    ("😄", "&#128516;"),
    ("😅", "&#128517;"),
    ("😆", "&#128518;"),
    ("😉", "&#128521;"),
    ("😊", "&#128522;"),
    ("😋", "&#128523;"),
    ("😎", "&#128526;"),
    ("😍", "&#128525;"),
    ("😘", "&#128536;"),
    ("🥰", "&#129392;"),
    ("😗", "&#128535;"),
    ("😙", "&#128537;"),
    ("😚", "&#128538;"),
    ("🙂", "&#128578;"),
    ("🤗", "&#129303;"),
    ("🤩", "&#129321;"),
    ("🤔", "&#129300;"),
    ("🤨", "&#129320;"),
    ("😐", "&#128528;"),
    ("😑", "&#128529;"),
    ("😶", "&#128566;"),
    ("🙄", "&#128580;"),
    ("😏", "&#128527;"),
    ("😣", "&#128547;"),
    ("😥", "&#128549;"),
    ("😮", "&#128558;"),
    ("🤐", "&#129296;"),
    ("😯", "&#128559;"),
    ("😪", "&#128554;"),
    ("😫", "&#128555;"),
    ("😴", "&#128564;"),
    ("😌", "&#128524;"),
    ("😛", "&#128539;"),
    ("😜", "&#128540;"),
    ("😝", "&#128541;"),
    ("🤤", "&#129316;"),
    ("😒", "&#128530;"),
    ("😓", "&#128531;"),
    ("😔", "&#128532;"),
    ("😕", "&#128533;"),
    ("🙃", "&#128579;"),
    ("🤑", "&#129297;"),
    ("😲", "&#128562;"),
    ("🙁", "&#128577;"),
    ("😖", "&#128534;"),
    ("😞", "&#128542;"),
    ("😟", "&#128543;"),
    ("😤", "&#128548;"),
    ("😢", "&#128546;"),
    ("😭", "&#128557;"),
    ("😦", "&#128550;"),
    ("😧", "&#128551;"),
    ("😨", "&#128552;"),
    ("😩", "&#128553;"),
    ("🤯", "&#129327;"),
    ("😬", "&#128556;"),
    ("😰", "&#128560;"),
    ("😱", "&#128561;"),
    ("🥵", "&#129397;"),
    ("🥶", "&#129398;"),
    ("😳", "&#128563;"),
    ("🤪", "&#129322;"),
    ("😵", "&#128565;"),
    ("🥴", "&#129396;"),
    ("😷", "&#128567;"),
    ("🤒", "&#129298;"),
    ("🤕", "&#129301;"),
    ("🤢", "&#129314;"),
    ("🤮", "&#129326;"),
    ("🤧", "&#129319;"),
    ("😇", "&#128519;"),
    ("🥳", "&#129395;"),
    ("🥺", "&#129402;"),
    ("🤠", "&#129312;"),
    ("🤡", "&#129313;"),
    ("🤥", "&#129317;"),
    ("🤫", "&#129323;"),
    ("🤭", "&#129325;"),
    ("🧐", "&#129488;"),
    ("🤓", "&#129299;"),
    // Hand gestures
    ("👍", "&#128077;"),
    ("👎", "&#128078;"),
    ("👌", "&#128076;"),
    ("✌️", "&#9996;"),
    ("🤞", "&#129310;"),
    ("🤟", "&#129311;"),
    ("🤘", "&#129304;"),
    ("🤙", "&#129305;"),
    ("👈", "&#128072;"),
    ("👉", "&#128073;"),
    ("👆", "&#128070;"),
    ("🖕", "&#128405;"),
    ("👇", "&#128071;"),
    ("☝️", "&#9757;"),
    ("👋", "&#128075;"),
    ("🤚", "&#129306;"),
    ("🖐️", "&#128400;"),
    ("✋", "&#9995;"),
    ("🖖", "&#128406;"),
    ("👏", "&#128079;"),
    ("🙌", "&#128588;"),
    ("👐", "&#128080;"),
    ("🤲", "&#129330;"),
    ("🤝", "&#129309;"),
    ("🙏", "&#128591;"),
    // Hearts and symbols
    ("❤️", "&#10764;"),
    ("🧡", "&#129505;"),
    ("💛", "&#128155;"),
    ("💚", "&#128154;"),
    ("💙", "&#128153;"),
    ("💜", "&#128156;"),
    ("🖤", "&#128420;"),
    ("🤍", "&#129293;"),
    ("🤎", "&#129294;"),
    ("💔", "&#128148;"),
    ("❣️", "&#10083;"),
    ("💕", "&#128149;"),
    ("💞", "&#128158;"),
    ("💓", "&#128147;"),
    ("💗", "&#128151;"),
    ("💖", "&#128150;"),
    ("💘", "&#128152;"),
    ("💝", "&#128157;"),
    ("💟", "&#128159;"),
    // Mathematical and special symbols
    ("∞", "&#8734;"),
    ("π", "&#960;"),
    ("√", "&#8730;"),
    ("∑", "&#8721;"),
    ("∆", "&#8710;"),
    ("Ω", "&#937;"),
    ("α", "&#945;"),
    ("β", "&#946;"),
    ("γ", "&#947;"),
    ("δ", "&#948;"),
    ("ε", "&#949;"),
    ("θ", "&#952;"),
    ("λ", "&#955;"),
    ("μ", "&#956;"),
    ("σ", "&#963;"),
    ("φ", "&#966;"),
    ("χ", "&#967;"),
    ("ψ", "&#968;"),
    // Currency and special characters
    ("€", "&#8364;"),
    ("£", "&#163;"),
    ("¥", "&#165;"),
    ("₹", "&#8377;"),
    ("₩", "&#8361;"),
    ("₽", "&#8381;"),
    ("©", "&#169;"),
    ("®", "&#174;"),
    ("™", "&#8482;"),
    ("°", "&#176;"),
    ("±", "&#177;"),
    ("×", "&#215;"),
    ("÷", "&#247;"),
    ("≠", "&#8800;"),
    ("≤", "&#8804;"),
    ("≥", "&#8805;"),
    ("≈", "&#8776;"),
    ("∈", "&#8712;"),
    ("∉", "&#8713;"),
    ("∩", "&#8745;"),
    ("∪", "&#8746;"),
    ("⊂", "&#8834;"),
    ("⊃", "&#8835;"),
    ("⊆", "&#8838;"),
    ("⊇", "&#8839;"),
    ("∀", "&#8704;"),
    ("∃", "&#8707;"),
    ("∄", "&#8708;"),
    ("∧", "&#8743;"),
    ("∨", "&#8744;"),
    ("¬", "&#172;"),
    ("→", "&#8594;"),
    ("←", "&#8592;"),
    ("↑", "&#8593;"),
    ("↓", "&#8595;"),
    ("↔", "&#8596;"),
    ("⇒", "&#8658;"),
    ("⇐", "&#8656;"),
    ("⇑", "&#8657;"),
    ("⇓", "&#8659;"),
    ("⇔", "&#8660;"),
];

/// Runtime-editable conversion table.
///
/// Entries may be added or removed without validation; callers are
/// responsible for well-formed entity strings.
#[derive(Debug, Clone)]
pub struct ConversionTable {
    entries: Vec<(String, String)>,
}

impl Default for ConversionTable {
    fn default() -> Self {
        ConversionTable {
            entries: DEFAULT_TABLE
                .iter()
                .map(|(c, e)| ((*c).to_string(), (*e).to_string()))
                .collect(),
        }
    }
}

impl ConversionTable {
    /// Number of curated entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add or replace a mapping.
    pub fn add(&mut self, text: &str, entity: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(t, _)| t == text) {
            entry.1 = entity.to_string();
        } else {
            self.entries.push((text.to_string(), entity.to_string()));
        }
    }

    /// Remove a mapping. Removing an absent entry is a no-op.
    pub fn remove(&mut self, text: &str) {
        self.entries.retain(|(t, _)| t != text);
    }

    /// Replace table-listed characters with their references, then convert
    /// any remaining supplementary-plane character to a numeric reference.
    pub fn to_entities(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let mut converted = text.to_string();
        for (from, to) in &self.entries {
            if converted.contains(from.as_str()) {
                converted = converted.replace(from.as_str(), to);
            }
        }

        convert_remaining_4byte_chars(&converted)
    }

    /// Reverse table-listed references, then decode standard character
    /// references.
    pub fn from_entities(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let mut converted = text.to_string();
        for (from, to) in &self.entries {
            if converted.contains(to.as_str()) {
                converted = converted.replace(to.as_str(), from);
            }
        }

        decode_entities(&converted)
    }
}

/// Whether the text contains any supplementary-plane (4-byte UTF-8)
/// character.
pub fn contains_4byte_chars(text: &str) -> bool {
    text.chars().any(|c| c as u32 > 0xFFFF)
}

/// Convert supplementary-plane characters to numeric references from their
/// decoded codepoints.
fn convert_remaining_4byte_chars(text: &str) -> String {
    if !contains_4byte_chars(text) {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c as u32 > 0xFFFF {
            out.push_str(&format!("&#{};", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode standard character references: `&#NNN;`, `&#xHHH;`, and the basic
/// named set.
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];

        let Some(end) = candidate.find(';') else {
            // No terminator anywhere after this point; the remainder
            // cannot hold a reference.
            out.push_str(candidate);
            return out;
        };

        let body = &candidate[1..end];
        match decode_reference(body) {
            Some(decoded) => {
                out.push_str(&decoded);
                rest = &candidate[end + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_reference(body: &str) -> Option<String> {
    if let Some(num) = body.strip_prefix('#') {
        let code = if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            u32::from_str_radix(hex, 16).ok()?
        } else {
            num.parse::<u32>().ok()?
        };
        return char::from_u32(code).map(String::from);
    }

    let named = match body {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        _ => return None,
    };
    Some(named.to_string())
}

/// Whether a storage charset is too narrow for 4-byte characters.
///
/// The legacy `utf8` family needs conversion; its 4-byte `utf8mb4` variant
/// does not. Anything else, including "unknown", is assumed sufficient.
pub fn needs_conversion(charset: &str) -> bool {
    charset.starts_with("utf8") && !charset.contains("utf8mb4")
}

/// Conversion service wired to settings and charset detection.
#[derive(Clone)]
pub struct Converter {
    table: ConversionTable,
    content: Arc<dyn ContentStore>,
    variables: Arc<dyn VariableStore>,
}

impl Converter {
    pub fn new(content: Arc<dyn ContentStore>, variables: Arc<dyn VariableStore>) -> Self {
        Converter {
            table: ConversionTable::default(),
            content,
            variables,
        }
    }

    /// Construct with a custom table.
    pub fn with_table(
        table: ConversionTable,
        content: Arc<dyn ContentStore>,
        variables: Arc<dyn VariableStore>,
    ) -> Self {
        Converter {
            table,
            content,
            variables,
        }
    }

    /// The active conversion table.
    pub fn table(&self) -> &ConversionTable {
        &self.table
    }

    async fn conversion_enabled(&self) -> Result<bool> {
        let settings = crate::settings::Settings::load(self.variables.as_ref()).await?;
        Ok(settings.charset_conversion_enabled)
    }

    /// Convert text for storage.
    ///
    /// Applies conversion only when the feature is enabled and the detected
    /// storage charset is a narrow one. An unknown charset skips
    /// conversion.
    pub async fn prepare_for_database(&self, text: &str) -> Result<String> {
        if !self.conversion_enabled().await? {
            return Ok(text.to_string());
        }

        let charset = self.content.storage_charset().await?;
        let Some(charset) = charset else {
            return Ok(text.to_string());
        };
        if !needs_conversion(&charset) {
            return Ok(text.to_string());
        }

        Ok(self.table.to_entities(text))
    }

    /// Convert stored text back for display.
    ///
    /// Reverses conversion whenever the feature is enabled, independent of
    /// charset detection.
    pub async fn prepare_for_display(&self, text: &str) -> Result<String> {
        if !self.conversion_enabled().await? {
            return Ok(text.to_string());
        }

        Ok(self.table.from_entities(text))
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("table_len", &self.table.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_untouched() {
        let table = ConversionTable::default();
        let text = "Monthly meeting notes, ward-1";
        assert_eq!(table.to_entities(text), text);
        assert_eq!(table.from_entities(text), text);
    }

    #[test]
    fn table_entries_round_trip() {
        let table = ConversionTable::default();
        assert_eq!(table.to_entities("😀"), "&#128512;");
        assert_eq!(table.from_entities("&#128512;"), "😀");
        // Multi-codepoint key with a variation selector.
        assert_eq!(table.to_entities("✌️"), "&#9996;");
        assert_eq!(table.from_entities("&#9996;"), "✌️");
    }

    #[test]
    fn red_heart_quirk_is_preserved() {
        // The deployed table maps the red heart to a reference that is not
        // its codepoint; the pair is still bijective within the table.
        let table = ConversionTable::default();
        assert_eq!(table.to_entities("❤️"), "&#10764;");
        assert_eq!(table.from_entities("&#10764;"), "❤️");
    }

    #[test]
    fn out_of_table_4byte_char_round_trips() {
        let table = ConversionTable::default();
        // U+20BB7 is not in the curated table.
        let text = "吉野家 𠮷";
        let encoded = table.to_entities(text);
        assert!(encoded.contains("&#134071;"));
        assert!(!contains_4byte_chars(&encoded));
        assert_eq!(table.from_entities(&encoded), text);
    }

    #[test]
    fn mixed_text_converts_only_wide_chars() {
        let table = ConversionTable::default();
        let encoded = table.to_entities("ward-1 😂 meeting");
        assert_eq!(encoded, "ward-1 &#128514; meeting");
    }

    #[test]
    fn detects_4byte_chars() {
        assert!(contains_4byte_chars("title 😀"));
        assert!(contains_4byte_chars("𠮷"));
        assert!(!contains_4byte_chars("会議"));
        assert!(!contains_4byte_chars("ascii"));
    }

    #[test]
    fn decode_handles_hex_and_named() {
        assert_eq!(decode_entities("&#x1F600;"), "😀");
        assert_eq!(decode_entities("a &amp; b &lt;c&gt;"), "a & b <c>");
        assert_eq!(decode_entities("&quot;x&quot; &apos;y&apos;"), "\"x\" 'y'");
    }

    #[test]
    fn decode_leaves_malformed_references_alone() {
        assert_eq!(decode_entities("a & b"), "a & b");
        assert_eq!(decode_entities("a & b & c"), "a & b & c");
        assert_eq!(decode_entities("&#zzz;"), "&#zzz;");
        assert_eq!(decode_entities("&unknown;"), "&unknown;");
        assert_eq!(decode_entities("trailing &#"), "trailing &#");
    }

    #[test]
    fn plain_ampersand_titles_decode_to_themselves() {
        let table = ConversionTable::default();
        for text in ["A & B", "PTA & School Board", "Q&A"] {
            assert_eq!(table.from_entities(text), text);
        }
    }

    #[test]
    fn runtime_table_edits() {
        let mut table = ConversionTable::default();
        let before = table.len();

        table.add("♻", "&#9851;");
        assert_eq!(table.len(), before + 1);
        assert_eq!(table.to_entities("♻"), "&#9851;");
        assert_eq!(table.from_entities("&#9851;"), "♻");

        table.remove("♻");
        assert_eq!(table.len(), before);
        assert_eq!(table.to_entities("♻"), "♻");

        // Replacing an existing mapping keeps a single entry.
        table.add("😀", "&#0;");
        assert_eq!(table.len(), before);
    }

    #[test]
    fn charset_matrix() {
        assert!(needs_conversion("utf8"));
        assert!(needs_conversion("utf8_general_ci"));
        assert!(!needs_conversion("utf8mb4"));
        assert!(!needs_conversion("latin1"));
        assert!(!needs_conversion("unknown"));
        assert!(!needs_conversion(""));
    }

    #[test]
    fn table_is_fully_populated() {
        let table = ConversionTable::default();
        assert_eq!(table.len(), 188);
        // Every entity string is a well-formed numeric reference.
        for (_, entity) in DEFAULT_TABLE {
            assert!(entity.starts_with("&#") && entity.ends_with(';'));
        }
    }
}
