//! Measurement units and memory arithmetic.
//!
//! Memory sizes reach us as `<number><unit>` pairs scraped from `top` output
//! (`KiB Mem : 999936 total`, `PhysMem: 12G used`). [`parse_memory`] turns
//! such a pair into an integer amount of a chosen base unit. The unit token
//! grammar distinguishes SI (`KB`, `MB`, `GB`) from binary (`KiB`, `MiB`,
//! `GiB`) multipliers; bare `K`, `M`, `G` are binary, which is what both
//! procps and macOS `top` mean by them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

const KIB: i64 = 1 << 10;
const MIB: i64 = 1 << 20;
const GIB: i64 = 1 << 30;
const KB: i64 = 1_000;
const MB: i64 = 1_000_000;
const GB: i64 = 1_000_000_000;

/// Unit in which a property value is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasureUnit {
    #[serde(rename = "B")]
    Byte,
    #[serde(rename = "KB")]
    KiloByte,
    #[serde(rename = "KiB")]
    KibiByte,
    #[serde(rename = "MB")]
    MegaByte,
    #[serde(rename = "MiB")]
    MebiByte,
    #[serde(rename = "GB")]
    GigaByte,
    #[serde(rename = "GiB")]
    GibiByte,
    /// Ratio scaled to `[0, 100]`.
    #[serde(rename = "%")]
    Percent,
    #[serde(rename = "ms")]
    MilliSecond,
    #[serde(rename = "s")]
    Second,
}

impl MeasureUnit {
    pub fn symbol(self) -> &'static str {
        match self {
            MeasureUnit::Byte => "B",
            MeasureUnit::KiloByte => "KB",
            MeasureUnit::KibiByte => "KiB",
            MeasureUnit::MegaByte => "MB",
            MeasureUnit::MebiByte => "MiB",
            MeasureUnit::GigaByte => "GB",
            MeasureUnit::GibiByte => "GiB",
            MeasureUnit::Percent => "%",
            MeasureUnit::MilliSecond => "ms",
            MeasureUnit::Second => "s",
        }
    }

    /// Number of bytes in one unit, `None` for non-memory units.
    pub fn bytes_factor(self) -> Option<i64> {
        match self {
            MeasureUnit::Byte => Some(1),
            MeasureUnit::KiloByte => Some(KB),
            MeasureUnit::KibiByte => Some(KIB),
            MeasureUnit::MegaByte => Some(MB),
            MeasureUnit::MebiByte => Some(MIB),
            MeasureUnit::GigaByte => Some(GB),
            MeasureUnit::GibiByte => Some(GIB),
            MeasureUnit::Percent | MeasureUnit::MilliSecond | MeasureUnit::Second => None,
        }
    }

    pub fn is_memory(self) -> bool {
        self.bytes_factor().is_some()
    }
}

impl fmt::Display for MeasureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Tokenises a memory unit such as `KiB`, `MB` or `G`.
///
/// Grammar: `B | (K|M|G) ("" | "B" | "iB")`. Matching is case-sensitive.
pub fn parse_memory_unit(token: &str) -> Result<MeasureUnit, ParseError> {
    let mut chars = token.chars();
    let scale = chars.next();
    let suffix = chars.as_str();

    let unit = match (scale, suffix) {
        (Some('B'), "") => MeasureUnit::Byte,
        (Some('K'), "" | "iB") => MeasureUnit::KibiByte,
        (Some('K'), "B") => MeasureUnit::KiloByte,
        (Some('M'), "" | "iB") => MeasureUnit::MebiByte,
        (Some('M'), "B") => MeasureUnit::MegaByte,
        (Some('G'), "" | "iB") => MeasureUnit::GibiByte,
        (Some('G'), "B") => MeasureUnit::GigaByte,
        _ => {
            return Err(ParseError::new(format!(
                "unknown memory unit '{token}'"
            )));
        }
    };
    Ok(unit)
}

/// Converts `value` expressed in `unit` into an integer amount of `target`.
///
/// The value must be a non-negative integer. Conversion to a coarser target
/// truncates toward zero.
pub fn parse_memory(value: &str, unit: &str, target: MeasureUnit) -> Result<i64, ParseError> {
    let source = parse_memory_unit(unit)?;
    let target_factor = target
        .bytes_factor()
        .ok_or_else(|| ParseError::new(format!("'{target}' is not a memory unit")))?;
    let source_factor = source.bytes_factor().unwrap_or(1);

    let amount: i64 = value
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|v| i64::try_from(v).ok())
        .ok_or_else(|| ParseError::new(format!("invalid memory amount '{value}'")))?;

    let bytes = amount
        .checked_mul(source_factor)
        .ok_or_else(|| ParseError::new(format!("{value}{unit} overflows a 64-bit byte count")))?;

    Ok(bytes / target_factor)
}

/// Renders a byte count in the largest unit that represents it exactly.
///
/// The result always parses back: `parse_memory(&v, u, Byte) == bytes`.
pub fn format_bytes(bytes: i64) -> (String, &'static str) {
    const CANDIDATES: [MeasureUnit; 6] = [
        MeasureUnit::GibiByte,
        MeasureUnit::GigaByte,
        MeasureUnit::MebiByte,
        MeasureUnit::MegaByte,
        MeasureUnit::KibiByte,
        MeasureUnit::KiloByte,
    ];

    if bytes != 0 {
        for unit in CANDIDATES {
            let factor = unit.bytes_factor().unwrap_or(1);
            if bytes % factor == 0 {
                return ((bytes / factor).to_string(), unit.symbol());
            }
        }
    }
    (bytes.to_string(), MeasureUnit::Byte.symbol())
}
