//! Hex text decoding.
//!
//! Input is line oriented. Each line may carry an `offset:` marker, pairs of
//! hex digits separated by arbitrary whitespace, and `"quoted"` runs whose
//! characters are emitted byte for byte. `#` starts a comment.

use crate::error::{ParseError, ParseResult};

pub fn parse(src: &str) -> ParseResult<Vec<u8>> {
    let mut out = Vec::with_capacity(src.len() / 2);

    for (index, raw_line) in src.split('\n').enumerate() {
        let line = raw_line.split('#').next().unwrap_or_default();
        parse_line(line, &mut out)
            .map_err(|e| e.with_context(format!("...at line {}", index + 1)))?;
    }

    Ok(out)
}

fn parse_line(line: &str, out: &mut Vec<u8>) -> ParseResult<()> {
    let line = strip_offset_marker(line, out.len())?;

    let mut pending: Option<u8> = None;
    let mut in_quote = false;

    for c in line.chars() {
        if in_quote {
            if c == '"' {
                in_quote = false;
            } else {
                out.push(c as u32 as u8);
            }
            continue;
        }

        if c <= ' ' {
            continue;
        }

        if c == '"' {
            if pending.is_some() {
                return Err(spare_digit(out.len()));
            }
            in_quote = true;
            continue;
        }

        let Some(digit) = c.to_digit(16) else {
            return Err(ParseError::at(
                out.len(),
                format!("bogus digit character: \"{c}\""),
            ));
        };

        match pending.take() {
            None => pending = Some(digit as u8),
            Some(high) => out.push((high << 4) | digit as u8),
        }
    }

    if pending.is_some() {
        return Err(spare_digit(out.len()));
    }
    if in_quote {
        return Err(ParseError::at(
            out.len(),
            format!("unterminated quote around offset {:08x}", out.len()),
        ));
    }

    Ok(())
}

/// Checks and removes a leading `offset:` marker. A colon that appears after
/// the first quote belongs to quoted text.
fn strip_offset_marker(line: &str, emitted: usize) -> ParseResult<&str> {
    let Some(colon_at) = line.find(':') else {
        return Ok(line);
    };
    if line.find('"').is_some_and(|quote_at| quote_at < colon_at) {
        return Ok(line);
    }

    let marker = line[..colon_at].trim();
    let alleged = usize::from_str_radix(marker, 16)
        .map_err(|_| ParseError::at(emitted, format!("bogus offset marker: {marker}")))?;
    if alleged != emitted {
        return Err(ParseError::at(emitted, format!("bogus offset marker: {marker}")));
    }

    Ok(&line[colon_at + 1..])
}

fn spare_digit(offset: usize) -> ParseError {
    ParseError::at(offset, format!("spare digit around offset {offset:08x}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_pairs_across_whitespace_and_lines() {
        let bytes = parse("ca fe\nba be 00 00\n0032").unwrap();
        assert_eq!(bytes, vec![0xca, 0xfe, 0xba, 0xbe, 0x00, 0x00, 0x00, 0x32]);
    }

    #[test]
    fn digits_may_run_together() {
        assert_eq!(parse("cafeBABE").unwrap(), vec![0xca, 0xfe, 0xba, 0xbe]);
    }

    #[test]
    fn comments_are_ignored() {
        let src = "# magic\ncafe babe # trailing\n# 00 00\n";
        assert_eq!(parse(src).unwrap(), vec![0xca, 0xfe, 0xba, 0xbe]);
    }

    #[test]
    fn offset_markers_must_match_output_length() {
        let src = "0: cafe babe\n4: 0000 0032\n";
        assert_eq!(parse(src).unwrap().len(), 8);

        let err = parse("0: cafe\n3: babe\n").unwrap_err();
        assert!(err.message().starts_with("bogus offset marker: 3"));
        assert_eq!(err.context(), ["...at line 2".to_string()]);
    }

    #[test]
    fn quoted_text_is_copied_verbatim() {
        let bytes = parse("0003 \"a:b\"").unwrap();
        assert_eq!(bytes, vec![0x00, 0x03, b'a', b':', b'b']);
    }

    #[test]
    fn colon_inside_quote_is_not_an_offset() {
        assert_eq!(parse("\"x:y\"").unwrap(), b"x:y".to_vec());
    }

    #[test]
    fn spare_digit_is_rejected() {
        let err = parse("cafe b\nabe").unwrap_err();
        assert!(err.message().starts_with("spare digit"));
        assert_eq!(err.offset(), Some(2));

        assert!(parse("c\"x\"").unwrap_err().message().starts_with("spare digit"));
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        let err = parse("\"abc\n\"").unwrap_err();
        assert!(err.message().starts_with("unterminated quote"));
    }

    #[test]
    fn bogus_digit_is_rejected() {
        let err = parse("cafe zz").unwrap_err();
        assert_eq!(err.message(), "bogus digit character: \"z\"");
    }

    #[test]
    fn crlf_line_endings_are_whitespace() {
        assert_eq!(parse("ca fe\r\nba be\r\n").unwrap(), vec![0xca, 0xfe, 0xba, 0xbe]);
    }
}
