use std::fmt;
use std::str::FromStr;

/// Converts credential text into the modem's current character set before it
/// is embedded in a command. `None` means the text can't be represented.
pub trait CharsetEncoder: Send + Sync {
    fn encode(&self, text: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Ira,
    Gsm,
    Utf8,
    Ucs2,
}

impl CharsetEncoder for Charset {
    fn encode(&self, text: &str) -> Option<String> {
        match self {
            // Only the printable ASCII subset maps 1:1 on GSM 7-bit.
            Charset::Ira | Charset::Gsm => text
                .chars()
                .all(|c| c.is_ascii() && !c.is_ascii_control())
                .then(|| text.to_string()),
            Charset::Utf8 => Some(text.to_string()),
            Charset::Ucs2 => {
                let mut bytes = Vec::with_capacity(text.len() * 2);
                for c in text.chars() {
                    let unit = u16::try_from(u32::from(c)).ok()?;
                    bytes.extend_from_slice(&unit.to_be_bytes());
                }
                Some(hex::encode_upper(bytes))
            }
        }
    }
}

impl FromStr for Charset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IRA" | "" => Ok(Charset::Ira),
            "GSM" => Ok(Charset::Gsm),
            "UTF8" | "UTF-8" => Ok(Charset::Utf8),
            "UCS2" => Ok(Charset::Ucs2),
            other => Err(format!("unsupported charset '{other}'")),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Charset::Ira => "IRA",
            Charset::Gsm => "GSM",
            Charset::Utf8 => "UTF-8",
            Charset::Ucs2 => "UCS2",
        };
        f.write_str(name)
    }
}
