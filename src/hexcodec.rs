//! Hexadecimal text for byte buffers.

/// Encodes `data` as lowercase hex with no separators.
pub fn encode(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decodes hex text. ASCII whitespace between digits is ignored, so dumps like `"02 01 06"` are accepted.
pub fn decode(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let digits: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    hex::decode(digits)
}

/// Displays a byte slice as lowercase hex without allocating.
#[derive(Debug, Clone, Copy)]
pub struct Hex<'a>(pub &'a [u8]);

impl std::fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut buf = [0u8; 64];
        for chunk in self.0.chunks(buf.len() / 2) {
            let out = &mut buf[..chunk.len() * 2];
            hex::encode_to_slice(chunk, out).map_err(|_| std::fmt::Error)?;
            f.write_str(std::str::from_utf8(out).map_err(|_| std::fmt::Error)?)?;
        }
        Ok(())
    }
}
