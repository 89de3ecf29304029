//! Run length coding of WSI image lines.
//!
//! From the NOWradPLUS technical description: runs of up to 65,536 pixels
//! of colors 0 to 255 are coded in 1, 2 or 3 bytes. The low nibble of the
//! color travels with every run, the high nibble is set by a separate flag
//! byte and carries over until the next flag byte or the end of the line.
//!
//! | first byte  | meaning                                                    |
//! |-------------|------------------------------------------------------------|
//! | `0x0?-0xC?` | run of `(byte >> 4) + 1` pixels (1..=13)                   |
//! | `0xD?`      | next 2 bytes (little-endian) are the run length minus 1    |
//! | `0xE?`      | next byte is the run length minus 1 (14..=256)             |
//! | `0xF?`      | sets the high nibble of the color, codes no pixels         |
//!
//! A 1 pixel run of low nibble 0 followed by a high nibble flag of 0 reads
//! `0x00 0xF0`, which is also the segment flag sequence. The encoder marks
//! such data with a trailing `0x00` control byte.

use crate::cursor::{ByteCursor, BIN_FLAG, FLAG1, FLAG2};
use crate::error::WsiResult;
use tracing::trace;

/// High nibble of a byte that sets the carried color high nibble.
pub const HI_COLOR_FLAG: u8 = 0xF;
/// High nibble of a 2 byte run.
pub const TWO_BYTE_COUNT: u8 = 0xE;
/// High nibble of a 3 byte run.
pub const THREE_BYTE_COUNT: u8 = 0xD;

/// Longest run a single code can carry.
pub const MAX_RUN: u32 = 65_536;
const MAX_ONE_BYTE_RUN: u32 = 13;
const MAX_TWO_BYTE_RUN: u32 = 256;

/// One decoded run of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// Effective color index, `(high_nibble << 4) | low_nibble`.
    pub color: u8,
    /// Number of pixels, 1..=65536.
    pub length: u32,
}

impl Run {
    pub fn new(color: u8, length: u32) -> Self {
        Self { color, length }
    }
}

fn effective_color(high_nibble: u8, byte: u8) -> u8 {
    (high_nibble << 4) | (byte & 0x0F)
}

/// Decoder for the run length stream of one image line.
///
/// The cursor must sit just after the 2 byte line number. Decoding stops in
/// front of the next segment flag, which is left for the segment parser.
pub struct RunLengthDecoder<'c, 'a> {
    cursor: &'c mut ByteCursor<'a>,
    high_nibble: u8,
}

impl<'c, 'a> RunLengthDecoder<'c, 'a> {
    pub fn new(cursor: &'c mut ByteCursor<'a>) -> Self {
        Self {
            cursor,
            high_nibble: 0,
        }
    }

    /// Decodes runs up to the next segment flag.
    ///
    /// # Errors
    ///
    /// Returns `WsiError::UnexpectedEnd` if the data ends before a segment
    /// flag terminates the line.
    pub fn decode_line(mut self) -> WsiResult<Vec<Run>> {
        let mut runs = Vec::new();

        loop {
            match self.cursor.peek_flag()? {
                Some(BIN_FLAG) => {
                    // Stuffed data: a 1 pixel run in the current high nibble,
                    // then a high nibble flag of 0.
                    let bytes = self.cursor.read_bytes(3)?;
                    let run = Run::new(effective_color(self.high_nibble, bytes[0]), 1);
                    trace!("stuffed run: {:?}", run);
                    runs.push(run);
                    self.high_nibble = bytes[1] & 0x0F;
                    continue;
                }
                Some(_) => break,
                None => {}
            }

            let byte = self.cursor.read_u8()?;
            let run = match byte >> 4 {
                HI_COLOR_FLAG => {
                    self.high_nibble = byte & 0x0F;
                    trace!("high nibble set to {:#x}", self.high_nibble);
                    continue;
                }
                TWO_BYTE_COUNT => {
                    let length = self.cursor.read_u8()? as u32 + 1;
                    Run::new(effective_color(self.high_nibble, byte), length)
                }
                THREE_BYTE_COUNT => {
                    let length = self.cursor.read_u16_le()? as u32 + 1;
                    Run::new(effective_color(self.high_nibble, byte), length)
                }
                count => Run::new(effective_color(self.high_nibble, byte), count as u32 + 1),
            };
            trace!("run: {:?}", run);
            runs.push(run);
        }

        Ok(runs)
    }
}

/// Encoder producing the run length stream for one image line.
///
/// Used to build synthetic files; the output decodes back to the same runs
/// with [`RunLengthDecoder`]. Runs longer than 65,536 pixels are split.
#[derive(Debug, Default)]
pub struct RunLengthEncoder {
    out: Vec<u8>,
    high_nibble: u8,
    last_was_flag1: bool,
}

impl RunLengthEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes a full line.
    pub fn encode_line(runs: &[Run]) -> Vec<u8> {
        let mut encoder = Self::new();
        for run in runs {
            encoder.push(*run);
        }
        encoder.finish()
    }

    /// Appends a run. Zero length runs are ignored.
    pub fn push(&mut self, run: Run) {
        let mut remaining = run.length;
        while remaining > 0 {
            let length = remaining.min(MAX_RUN);
            self.push_code(run.color, length);
            remaining -= length;
        }
    }

    fn push_code(&mut self, color: u8, length: u32) {
        let high = color >> 4;
        let low = color & 0x0F;

        if high != self.high_nibble {
            let flag = (HI_COLOR_FLAG << 4) | high;
            self.out.push(flag);
            if self.last_was_flag1 && flag == FLAG2 {
                self.out.push(BIN_FLAG);
            }
            self.high_nibble = high;
        }

        if length <= MAX_ONE_BYTE_RUN {
            let code = (((length - 1) as u8) << 4) | low;
            self.out.push(code);
            self.last_was_flag1 = code == FLAG1;
        } else if length <= MAX_TWO_BYTE_RUN {
            self.out.push((TWO_BYTE_COUNT << 4) | low);
            self.out.push((length - 1) as u8);
            self.last_was_flag1 = false;
        } else {
            self.out.push((THREE_BYTE_COUNT << 4) | low);
            self.out
                .extend_from_slice(&((length - 1) as u16).to_le_bytes());
            self.last_was_flag1 = false;
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Terminates a line with the image line command flag.
    fn terminated(mut line: Vec<u8>) -> Vec<u8> {
        line.extend_from_slice(&[FLAG1, FLAG2, 0x0C]);
        line
    }

    fn decode(bytes: &[u8]) -> Vec<Run> {
        let mut cur = ByteCursor::new(bytes);
        RunLengthDecoder::new(&mut cur).decode_line().unwrap()
    }

    #[test]
    fn test_documented_example() {
        let data = terminated(vec![
            0xD0, 0x05, 0x01, 0xF1, 0x01, 0x12, 0xE3, 0x20, 0x00, 0xF0, 0x00, 0xD0, 0x00, 0x0F,
        ]);
        let runs = decode(&data);

        assert_eq!(
            runs,
            vec![
                Run::new(0, 262),
                Run::new(17, 1),
                Run::new(18, 2),
                Run::new(19, 33),
                Run::new(16, 1),
                Run::new(0, 3841),
            ]
        );
    }

    #[test]
    fn test_decoder_stops_in_front_of_flag() {
        let data = terminated(vec![0x25]);
        let mut cur = ByteCursor::new(&data);
        let runs = RunLengthDecoder::new(&mut cur).decode_line().unwrap();

        assert_eq!(runs, vec![Run::new(5, 3)]);
        assert_eq!(cur.position(), 1);
        assert!(cur.at_segment_flag().unwrap());
    }

    #[test]
    fn test_high_nibble_persists() {
        let data = terminated(vec![0xF2, 0x03, 0x14, 0xE5, 0x0F, 0xF0, 0x06]);
        let runs = decode(&data);

        assert_eq!(
            runs,
            vec![
                Run::new(0x23, 1),
                Run::new(0x24, 2),
                Run::new(0x25, 16),
                Run::new(0x06, 1),
            ]
        );
    }

    #[test]
    fn test_high_nibble_resets_each_line() {
        let first = terminated(vec![0xF3, 0x01]);
        let second = terminated(vec![0x01]);
        assert_eq!(decode(&first), vec![Run::new(0x31, 1)]);
        assert_eq!(decode(&second), vec![Run::new(0x01, 1)]);
    }

    #[test]
    fn test_unterminated_line_is_error() {
        let data = vec![0x25, 0x13];
        let mut cur = ByteCursor::new(&data);
        assert!(RunLengthDecoder::new(&mut cur).decode_line().is_err());
    }

    #[test]
    fn test_round_trip_run_lengths() {
        let runs: Vec<Run> = [1u32, 13, 14, 256, 257, 65_536]
            .iter()
            .enumerate()
            .map(|(i, &len)| Run::new((i as u8 % 15) + 1, len))
            .collect();

        let encoded = RunLengthEncoder::encode_line(&runs);
        assert_eq!(decode(&terminated(encoded)), runs);
    }

    #[test]
    fn test_round_trip_stuff_byte() {
        let runs = vec![
            Run::new(0x10, 1),
            Run::new(0x05, 1),
            Run::new(0x00, 1),
            Run::new(0x3A, 20),
            Run::new(0x30, 1),
            Run::new(0x00, 300),
        ];

        let encoded = RunLengthEncoder::encode_line(&runs);
        assert_eq!(&encoded[..5], &[0xF1, 0x00, 0xF0, 0x00, 0x05]);
        assert_eq!(decode(&terminated(encoded)), runs);
    }

    #[test]
    fn test_encoder_splits_long_runs() {
        let encoded = RunLengthEncoder::encode_line(&[Run::new(2, 70_000)]);
        assert_eq!(
            decode(&terminated(encoded)),
            vec![Run::new(2, 65_536), Run::new(2, 4_464)]
        );
    }
}
