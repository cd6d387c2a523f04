/// Frame delimiter.
pub const FEND: u8 = 0xC0;
/// Escape introducer.
pub const FESC: u8 = 0xDB;
/// Escaped FEND.
pub const TFEND: u8 = 0xDC;
/// Escaped FESC.
pub const TFESC: u8 = 0xDD;

/// Escape `payload` and wrap it in FEND delimiters.
pub fn escape(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 2);
    out.push(FEND);
    for &b in payload {
        match b {
            FEND => out.extend_from_slice(&[FESC, TFEND]),
            FESC => out.extend_from_slice(&[FESC, TFESC]),
            _ => out.push(b),
        }
    }
    out.push(FEND);
    out
}

/// Undo [`escape`]. Delimiters are dropped wherever they appear.
///
/// An escape followed by anything but TFEND/TFESC is dropped together with
/// that byte; a trailing lone FESC is dropped.
pub fn unescape(frame: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.len());
    let mut escaped = false;
    for &b in frame {
        if escaped {
            match b {
                TFEND => out.push(FEND),
                TFESC => out.push(FESC),
                _ => {}
            }
            escaped = false;
        } else if b == FESC {
            escaped = true;
        } else if b != FEND {
            out.push(b);
        }
    }
    out
}

/// Build a data frame for `port`: `FEND (port << 4) payload FEND`, escaped.
pub fn data_frame(port: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 1);
    body.push((port & 0x0F) << 4);
    body.extend_from_slice(payload);
    escape(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_wraps_and_substitutes() {
        assert_eq!(escape(b""), vec![FEND, FEND]);
        assert_eq!(
            escape(&[1, FEND, 2, FESC, 3]),
            vec![FEND, 1, FESC, TFEND, 2, FESC, TFESC, 3, FEND]
        );
    }

    #[test]
    fn unescape_inverts_escape() {
        let samples: [&[u8]; 6] = [
            b"",
            b"plain text",
            &[FEND],
            &[FESC],
            &[FESC, TFEND, FEND, TFESC],
            &[0xFF, FEND, FEND, FESC, FESC, 0x00],
        ];
        for sample in samples {
            assert_eq!(unescape(&escape(sample)), sample);
        }
        let all: Vec<u8> = (0..=255).collect();
        assert_eq!(unescape(&escape(&all)), all);
    }

    #[test]
    fn unescaped_never_longer() {
        let all: Vec<u8> = (0..=255).rev().collect();
        let framed = escape(&all);
        assert!(unescape(&framed).len() <= framed.len());
    }

    #[test]
    fn stray_escape_sequences() {
        assert_eq!(unescape(&[FEND, 1, FESC, 0x41, 2, FEND]), vec![1, 2]);
        assert_eq!(unescape(&[FEND, 1, FESC]), vec![1]);
    }

    #[test]
    fn data_frame_escapes_command_byte() {
        assert_eq!(data_frame(0, b"hi"), vec![FEND, 0x00, b'h', b'i', FEND]);
        // Port 12 makes the command byte equal to FEND.
        assert_eq!(data_frame(12, b""), vec![FEND, FESC, TFEND, FEND]);
    }
}
