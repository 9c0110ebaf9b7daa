/// Digit count of a full Xentis id.
pub const ID_DIGITS: usize = 16;
/// Digit count of the class part prefix of an id.
pub const CLASS_PART_DIGITS: usize = 4;

const CLASS_PART_TABLE_MASK: i64 = 0xfff;
const CLASS_PART_TABLE_FLAG: i64 = 0x1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XentisId {
    pub value: i64,
    /// Hex rendering used for the digit count check.
    pub hex: String,
}

impl XentisId {
    /// Leading class part digits, or `None` when the hex text is shorter.
    pub fn class_part_text(&self) -> Option<&str> {
        self.hex.get(..CLASS_PART_DIGITS)
    }
}

/// Accept `text` as hex first, then as decimal re-rendered to hex; either way the
/// hex text must have exactly `digits` characters.
pub fn parse_xentis_id(text: &str, digits: usize) -> Option<XentisId> {
    let (value, hex) = match i64::from_str_radix(text, 16) {
        Ok(value) => (value, text.to_string()),
        Err(_) => {
            let value = text.parse::<i64>().ok()?;
            (value, signed_hex(value))
        }
    };
    if hex.chars().count() != digits {
        return None;
    }
    Some(XentisId { value, hex })
}

/// Table number encoded in a class part (`1083` -> `0x083`).
pub fn class_part_table_id(class_part: &str) -> Option<i64> {
    i64::from_str_radix(class_part, 16)
        .ok()
        .map(|value| value & CLASS_PART_TABLE_MASK)
}

/// Class part text of a table id, zero padded to four hex digits.
pub fn table_class_part(table_id: i64) -> String {
    format!("{:0>4}", signed_hex(table_id | CLASS_PART_TABLE_FLAG))
}

/// Lowercase hex with a leading minus for negative values.
pub fn signed_hex(value: i64) -> String {
    if value < 0 {
        format!("-{:x}", value.unsigned_abs())
    } else {
        format!("{value:x}")
    }
}

pub fn signed_binary(value: i64) -> String {
    if value < 0 {
        format!("-{:b}", value.unsigned_abs())
    } else {
        format!("{value:b}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_hex_id_is_kept_verbatim() {
        let id = parse_xentis_id("108300000012be3c", ID_DIGITS).expect("valid id");
        assert_eq!(id.hex, "108300000012be3c");
        assert_eq!(id.value, 0x1083_0000_0012_be3c);
        assert_eq!(id.class_part_text(), Some("1083"));
    }

    #[test]
    fn class_part_parses_as_hex() {
        let id = parse_xentis_id("1083", CLASS_PART_DIGITS).expect("valid class part");
        assert_eq!(id.value, 0x1083);
        assert_eq!(id.hex, "1083");
    }

    #[test]
    fn decimal_input_is_normalized_before_the_length_check() {
        assert_eq!(parse_xentis_id("5", ID_DIGITS), None);
        let id = parse_xentis_id("1190076201532653625", ID_DIGITS);
        assert_eq!(
            id.map(|id| id.hex),
            Some("1084000000000039".to_string())
        );
    }

    #[test]
    fn hex_input_with_wrong_length_is_rejected() {
        assert_eq!(parse_xentis_id("108300000012be3", ID_DIGITS), None);
        assert_eq!(parse_xentis_id("portfolio", ID_DIGITS), None);
        assert_eq!(parse_xentis_id("10830", CLASS_PART_DIGITS), None);
    }

    #[test]
    fn class_part_helpers_round_trip_table_ids() {
        assert_eq!(class_part_table_id("1083"), Some(0x83));
        assert_eq!(table_class_part(0x83), "1083");
        assert_eq!(table_class_part(2), "1002");
    }

    #[test]
    fn signed_renderings_keep_the_sign() {
        assert_eq!(signed_hex(-26), "-1a");
        assert_eq!(signed_hex(255), "ff");
        assert_eq!(signed_binary(-5), "-101");
    }
}
