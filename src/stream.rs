use std::fs;
use std::path::{Path, PathBuf};

use host1x_core::command::words_from_le_bytes;
use host1x_core::ClassId;

#[derive(Debug)]
pub enum StreamError {
    CouldNotReadStream(PathBuf, String),
    InvalidHexWord(PathBuf, usize, String),
    ClassAlreadyRegistered(ClassId),
}

impl std::error::Error for StreamError {}
impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::CouldNotReadStream(path, s) => {
                write!(f, "Could not read stream {}: {}", path.display(), s)
            }
            StreamError::InvalidHexWord(path, line, word) => write!(
                f,
                "Invalid word {:?} in {} at line {}",
                word,
                path.display(),
                line
            ),
            StreamError::ClassAlreadyRegistered(class_id) => {
                write!(f, "Device class {} is already registered", class_id)
            }
        }
    }
}

/// Loads a command stream, either raw little endian words or text with one
/// or more hex words per line.
pub fn load<P: AsRef<Path>>(path: P, hex: bool) -> Result<Vec<u32>, StreamError> {
    let path = path.as_ref();
    let bytes =
        fs::read(path).map_err(|e| StreamError::CouldNotReadStream(path.to_owned(), e.to_string()))?;

    if hex {
        let text = String::from_utf8(bytes)
            .map_err(|e| StreamError::CouldNotReadStream(path.to_owned(), e.to_string()))?;
        parse_hex(path, &text)
    } else {
        Ok(words_from_le_bytes(&bytes))
    }
}

/// Words are separated by whitespace or commas, `#` starts a comment.
fn parse_hex(path: &Path, text: &str) -> Result<Vec<u32>, StreamError> {
    let mut words = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let line = match line.find('#') {
            Some(comment) => &line[..comment],
            None => line,
        };

        for token in line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
        {
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            let word = u32::from_str_radix(digits, 16).map_err(|_| {
                StreamError::InvalidHexWord(path.to_owned(), i + 1, token.to_owned())
            })?;
            words.push(word);
        }
    }

    Ok(words)
}

/// Class ids on the command line, `0x` prefixed hex or decimal.
pub fn parse_class_id(arg: &str) -> Result<ClassId, String> {
    let value = match arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        Some(digits) => u16::from_str_radix(digits, 16),
        None => arg.parse::<u16>(),
    }
    .map_err(|e| format!("invalid class id {:?}: {}", arg, e))?;

    if value > ClassId::MASK {
        return Err(format!("class id {:#x} does not fit in 10 bits", value));
    }
    Ok(ClassId(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_with_comments_and_separators() {
        let text = "\
# select vic
0x17400003,
0x100 0x1
   # nothing here

00010000 # imm
";
        let words = parse_hex(Path::new("test.txt"), text).unwrap();
        assert_eq!(words, vec![0x1740_0003, 0x100, 0x1, 0x0001_0000]);
    }

    #[test]
    fn bad_hex_word_reports_line() {
        let err = parse_hex(Path::new("test.txt"), "0x1\n0x2 zz\n").unwrap_err();
        match err {
            StreamError::InvalidHexWord(_, line, word) => {
                assert_eq!(line, 2);
                assert_eq!(word, "zz");
            }
            _ => panic!("unexpected error {}", err),
        }
    }

    #[test]
    fn class_ids() {
        assert_eq!(parse_class_id("0x5D"), Ok(ClassId::VIC));
        assert_eq!(parse_class_id("240"), Ok(ClassId::NVDEC));
        assert!(parse_class_id("0x400").is_err());
        assert!(parse_class_id("vic").is_err());
    }
}
