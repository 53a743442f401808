//! PPP-style byte stuffing
//!
//! Inside a frame the escape marker and the terminator value are replaced by
//! two-byte escape sequences so that `0x7E` only ever appears as the final byte:
//! - `0x7D` → `0x7D 0x5D`
//! - `0x7E` → `0x7D 0x5E`

use super::{ProtocolError, GNET_ESC, GNET_TERM};

const ESCAPED_ESC: u8 = 0x5D;
const ESCAPED_TERM: u8 = 0x5E;

/// Escape everything before the trailing terminator
pub fn escape(frame: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let Some((&last, body)) = frame.split_last() else {
        return Err(ProtocolError::MalformedFrame("cannot escape an empty frame".into()));
    };
    if last != GNET_TERM {
        return Err(ProtocolError::MalformedFrame(format!(
            "frame ends with {:#04x} instead of the terminator",
            last
        )));
    }

    let mut out = Vec::with_capacity(frame.len() + 4);
    for &b in body {
        match b {
            GNET_ESC => out.extend_from_slice(&[GNET_ESC, ESCAPED_ESC]),
            GNET_TERM => out.extend_from_slice(&[GNET_ESC, ESCAPED_TERM]),
            _ => out.push(b),
        }
    }
    out.push(GNET_TERM);
    Ok(out)
}

/// Undo [`escape`]
///
/// An escape marker that is not followed by a known escape code is kept as-is.
pub fn unescape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == GNET_ESC && i + 1 < data.len() {
            match data[i + 1] {
                ESCAPED_ESC => {
                    out.push(GNET_ESC);
                    i += 2;
                    continue;
                }
                ESCAPED_TERM => {
                    out.push(GNET_TERM);
                    i += 2;
                    continue;
                }
                _ => {}
            }
        }
        out.push(data[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_escape_reserved_bytes() {
        let escaped = escape(&[0x02, 0x7E, 0x7D, 0x01, 0x7E]).unwrap();
        assert_eq!(escaped, vec![0x02, 0x7D, 0x5E, 0x7D, 0x5D, 0x01, 0x7E]);
    }

    #[test]
    fn test_escape_leaves_plain_frames_alone() {
        let frame = [0x02, 0x08, 0x18, 0x95, 0x7E];
        assert_eq!(escape(&frame).unwrap(), frame.to_vec());
    }

    #[test]
    fn test_escape_requires_terminator() {
        assert!(escape(&[0x02, 0x08]).is_err());
        assert!(escape(&[]).is_err());
    }

    #[test]
    fn test_unescape() {
        assert_eq!(
            unescape(&[0x01, 0x7D, 0x5E, 0x7D, 0x5D, 0x7E]),
            vec![0x01, 0x7E, 0x7D, 0x7E]
        );
        // Unknown escape codes and a dangling marker pass through
        assert_eq!(unescape(&[0x7D, 0x01, 0x7D]), vec![0x7D, 0x01, 0x7D]);
    }

    #[test]
    fn test_escape_is_invertible() {
        let inputs: Vec<Vec<u8>> = vec![
            vec![0x7E],
            vec![0x7D, 0x7E],
            vec![0x7E, 0x7E, 0x7E],
            vec![0x7D, 0x5D, 0x7D, 0x5E, 0x7E],
            (0u8..=255).chain([0x7E]).collect(),
        ];
        for input in inputs {
            let escaped = escape(&input).unwrap();
            assert_eq!(escaped.iter().filter(|&&b| b == GNET_TERM).count(), 1);
            assert_eq!(unescape(&escaped), input);
        }
    }
}
