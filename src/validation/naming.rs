//! Column and table naming
//!
//! Catalog names are snake_case: lowercase ASCII letters, digits and
//! underscores, starting with a letter.

use once_cell::sync::Lazy;
use regex::Regex;

static CAMEL_BOUNDARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid regex"));
static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));
static SHORT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid regex"));

/// Error for names that are not valid catalog short names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("Name is empty")]
    Empty,
    #[error("Invalid name '{0}': use lowercase letters, digits and underscores, starting with a letter")]
    InvalidCharacters(String),
    #[error("Invalid name '{name}': {length} characters, at most {max} allowed")]
    TooLong {
        name: String,
        length: usize,
        max: usize,
    },
}

/// Longest allowed short name
pub const MAX_SHORT_NAME_LENGTH: usize = 255;

/// Normalize `name` to snake_case
///
/// `%` becomes `pct` and `+` becomes `plus`; names starting with a digit get
/// a leading underscore. Accented Latin letters are folded to ASCII
/// (`Côte d'Ivoire` becomes `cote_d_ivoire`); letters of other scripts are
/// treated as separators.
///
/// ```rust
/// use owid_catalog::validation::underscore;
///
/// assert_eq!(underscore("GDP per capita (%)"), "gdp_per_capita_pct");
/// assert_eq!(underscore("lifeExpectancy"), "life_expectancy");
/// assert_eq!(underscore("2020"), "_2020");
/// ```
pub fn underscore(name: &str) -> String {
    let name = fold_latin(&name.replace('%', " pct ").replace('+', " plus "));
    let name = CAMEL_BOUNDARY_RE.replace_all(&name, "${1}_${2}").to_lowercase();
    let name = NON_WORD_RE.replace_all(&name, "_");
    let name = name.trim_matches('_');
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{name}")
    } else {
        name.to_string()
    }
}

fn fold_latin(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii() {
            folded.push(c);
            continue;
        }
        let lower = c.to_lowercase().next().unwrap_or(c);
        let ascii = match lower {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
            'æ' => "ae",
            'ç' | 'ć' | 'č' => "c",
            'ď' | 'đ' => "d",
            'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => "e",
            'ğ' => "g",
            'ì' | 'í' | 'î' | 'ï' | 'ī' | 'ı' => "i",
            'ł' | 'ľ' => "l",
            'ñ' | 'ń' | 'ň' => "n",
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
            'œ' => "oe",
            'ř' => "r",
            'ś' | 'ş' | 'š' | 'ș' => "s",
            'ß' => "ss",
            'ť' | 'ţ' | 'ț' => "t",
            'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => "u",
            'ý' | 'ÿ' => "y",
            'ź' | 'ż' | 'ž' => "z",
            _ => {
                folded.push(' ');
                continue;
            }
        };
        if c.is_uppercase() {
            folded.push_str(&ascii.to_uppercase());
        } else {
            folded.push_str(ascii);
        }
    }
    folded
}

/// Check that `name` is a valid short name for a dataset or table
pub fn validate_short_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > MAX_SHORT_NAME_LENGTH {
        return Err(NameError::TooLong {
            name: name.to_string(),
            length: name.len(),
            max: MAX_SHORT_NAME_LENGTH,
        });
    }
    if !SHORT_NAME_RE.is_match(name) {
        return Err(NameError::InvalidCharacters(name.to_string()));
    }
    Ok(())
}

/// Whether `name` is already in normalized form
pub fn is_underscored(name: &str) -> bool {
    !name.is_empty() && underscore(name) == name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_underscore() {
        assert_eq!(underscore("Population"), "population");
        assert_eq!(underscore("  Share of GDP (%) "), "share_of_gdp_pct");
        assert_eq!(underscore("15+ years"), "_15_plus_years");
        assert_eq!(underscore("co2-emissions/capita"), "co2_emissions_capita");
        assert_eq!(underscore("already_fine"), "already_fine");
        assert_eq!(underscore(""), "");
    }

    #[test]
    fn test_underscore_folds_accents() {
        assert_eq!(underscore("Côte d'Ivoire"), "cote_d_ivoire");
        assert_eq!(underscore("Curaçao"), "curacao");
        assert_eq!(underscore("São Tomé and Príncipe"), "sao_tome_and_principe");
        assert_eq!(underscore("Émissions"), "emissions");
        assert_eq!(underscore("Ελλάδα GDP"), "gdp");
    }

    #[test]
    fn test_validate_short_name() {
        assert!(validate_short_name("un_wpp").is_ok());
        assert!(validate_short_name("wpp2024").is_ok());
        assert_eq!(validate_short_name(""), Err(NameError::Empty));
        assert!(matches!(
            validate_short_name("UN WPP"),
            Err(NameError::InvalidCharacters(_))
        ));
        assert!(validate_short_name("_hidden").is_err());
        assert!(matches!(
            validate_short_name(&"a".repeat(300)),
            Err(NameError::TooLong { length: 300, .. })
        ));
    }

    #[test]
    fn test_is_underscored() {
        assert!(is_underscored("population_density"));
        assert!(is_underscored("_2020"));
        assert!(!is_underscored("Population"));
    }
}
