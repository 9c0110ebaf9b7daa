use crate::ids::{signed_binary, signed_hex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base {
    Binary,
    Decimal,
    Hex,
}

impl Base {
    pub fn radix(self) -> u32 {
        match self {
            Self::Binary => 2,
            Self::Decimal => 10,
            Self::Hex => 16,
        }
    }

    fn prefix(self) -> Option<&'static str> {
        match self {
            Self::Binary => Some("0b"),
            Self::Decimal => None,
            Self::Hex => Some("0x"),
        }
    }
}

/// Strip the base prefix (`0x`, `-0x`, `0b`, `-0b`) and a trailing `L`.
pub fn normalize_literal(text: &str, base: Base) -> String {
    let text = text.strip_suffix('L').unwrap_or(text);
    let Some(prefix) = base.prefix() else {
        return text.to_string();
    };
    if let Some(rest) = text.strip_prefix('-').and_then(|rest| rest.strip_prefix(prefix)) {
        return format!("-{rest}");
    }
    text.strip_prefix(prefix).unwrap_or(text).to_string()
}

/// Base announced by a literal prefix, if any.
pub fn prefixed_base(text: &str) -> Option<Base> {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    if unsigned.starts_with("0x") {
        Some(Base::Hex)
    } else if unsigned.starts_with("0b") {
        Some(Base::Binary)
    } else {
        None
    }
}

pub fn parse_in_base(text: &str, base: Base) -> Option<i64> {
    i64::from_str_radix(text, base.radix()).ok()
}

/// Multi-line conversion table; negative values also get their two's complement.
pub fn render_conversion(value: i64) -> String {
    let unsigned = value as u64;
    if value < 0 {
        format!(
            "Dec (unsigned): `{unsigned}`\n\
             Hex (unsigned): `{unsigned:x}`\n\
             Bin (unsigned): `{unsigned:b}`\n\
             Dec (signed): `{value}`\n\
             Hex (signed): `{}`\n\
             Bin (signed): `{}`",
            signed_hex(value),
            signed_binary(value)
        )
    } else {
        format!("Dec: `{unsigned}`\nHex: `{unsigned:x}`\nBin: `{unsigned:b}`")
    }
}
