use std::path::Path;

use crate::error::{DumpError, Result};
use crate::hexparse;

pub const CLASS_EXTENSION: &str = ".class";

/// Source of raw input bytes.
pub trait FileReader {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

#[derive(Debug, Default, Copy, Clone)]
pub struct FsReader;

impl FileReader for FsReader {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// One decoded input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputUnit {
    pub name: String,
    pub bytes: Vec<u8>,
}

pub fn is_binary_class(name: &str) -> bool {
    name.ends_with(CLASS_EXTENSION)
}

/// `.class` files pass through untouched, anything else is hex text.
pub fn load_input(name: &str, bytes: Vec<u8>) -> Result<InputUnit> {
    if is_binary_class(name) {
        return Ok(InputUnit {
            name: name.to_string(),
            bytes,
        });
    }

    let text = std::str::from_utf8(&bytes).map_err(|source| DumpError::Encoding {
        name: name.to_string(),
        source,
    })?;
    let decoded = hexparse::parse(text)
        .map_err(|e| e.with_context(format!("...while decoding {name}")))?;

    tracing::debug!(
        name,
        text_len = bytes.len(),
        decoded_len = decoded.len(),
        "decoded hex input"
    );
    Ok(InputUnit {
        name: name.to_string(),
        bytes: decoded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_extension_keeps_bytes() {
        let raw = vec![0xca, 0xfe, 0xba, 0xbe, b'#'];
        let unit = load_input("a/Foo.class", raw.clone()).unwrap();
        assert_eq!(unit.bytes, raw);
        assert_eq!(unit.name, "a/Foo.class");
    }

    #[test]
    fn other_extensions_are_hex_decoded() {
        let unit = load_input("Foo.hex", b"cafe babe # magic\n".to_vec()).unwrap();
        assert_eq!(unit.bytes, vec![0xca, 0xfe, 0xba, 0xbe]);

        let unit = load_input("Foo.CLASS", b"00ff".to_vec()).unwrap();
        assert_eq!(unit.bytes, vec![0x00, 0xff]);
    }

    #[test]
    fn invalid_utf8_is_an_encoding_error() {
        let err = load_input("Foo.txt", vec![b'c', 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, DumpError::Encoding { ref name, .. } if name == "Foo.txt"));
    }

    #[test]
    fn malformed_hex_is_a_parse_failure_with_file_context() {
        let err = load_input("Foo.txt", b"cafe q".to_vec()).unwrap_err();
        let DumpError::Parse(parse) = err else {
            panic!("expected parse failure");
        };
        assert!(parse.context().iter().any(|c| c.contains("Foo.txt")));
    }
}
