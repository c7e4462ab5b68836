use serde::{Deserialize, Serialize};

/// A byte count accepted either as a JSON number or as a suffixed string
///
/// Suffixes are binary, matching what the dataset manager prints: `K`/`Ki`,
/// `M`/`Mi`, `G`/`Gi`, `T`/`Ti`, with an optional trailing `B`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "SizeRepr", into = "u64")]
pub struct ByteSize(pub u64);

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeRepr {
    Bytes(u64),
    Text(String),
}

impl TryFrom<SizeRepr> for ByteSize {
    type Error = String;

    fn try_from(repr: SizeRepr) -> Result<Self, Self::Error> {
        match repr {
            SizeRepr::Bytes(n) => Ok(ByteSize(n)),
            SizeRepr::Text(s) => parse_size(&s).map(ByteSize),
        }
    }
}

impl From<ByteSize> for u64 {
    fn from(size: ByteSize) -> u64 {
        size.0
    }
}

impl ByteSize {
    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ByteSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse a size string (e.g., "256Mi", "1G", "500MiB", "8192")
pub fn parse_size(s: &str) -> Result<u64, String> {
    const UNITS: [(&str, u32); 4] = [("K", 1), ("M", 2), ("G", 3), ("T", 4)];

    let trimmed = s.trim();
    let without_b = trimmed.strip_suffix('B').unwrap_or(trimmed);
    let without_i = without_b.strip_suffix('i').unwrap_or(without_b);

    for (suffix, power) in UNITS {
        if let Some(num) = without_i.strip_suffix(suffix) {
            let n = num
                .trim()
                .parse::<u64>()
                .map_err(|e| format!("Invalid size '{}': {}", s, e))?;
            return n
                .checked_mul(1024u64.pow(power))
                .ok_or_else(|| format!("Size '{}' overflows 64 bits", s));
        }
    }

    trimmed
        .parse::<u64>()
        .map_err(|e| format!("Invalid size '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("8192").unwrap(), 8192);
        assert_eq!(parse_size("4K").unwrap(), 4096);
        assert_eq!(parse_size("256Mi").unwrap(), 256 * 1024 * 1024);
        assert_eq!(parse_size("500MiB").unwrap(), 500 * 1024 * 1024);
        assert_eq!(parse_size("1G").unwrap(), 1024 * 1024 * 1024);
        assert!(parse_size("lots").is_err());
        assert!(parse_size("99999999999T").is_err());
    }

    #[test]
    fn test_byte_size_from_json() {
        let n: ByteSize = serde_json::from_str("1048576").unwrap();
        assert_eq!(n, ByteSize(1_048_576));
        let s: ByteSize = serde_json::from_str("\"1Mi\"").unwrap();
        assert_eq!(s, ByteSize(1_048_576));
        assert!(serde_json::from_str::<ByteSize>("\"one meg\"").is_err());
        assert_eq!(serde_json::to_string(&s).unwrap(), "1048576");
    }
}
