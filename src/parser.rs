//! WSI segment parser.
//!
//! A WSI file is a sequence of segments. Each segment starts with the flag
//! sequence `0x00 0xF0` followed by a command byte that says what the
//! segment holds. Only image line segments are binary; the size and
//! navigation segments are ASCII text running up to the next flag.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tracing::{debug, info, trace, warn};

use crate::color::ColorTable;
use crate::cursor::{ByteCursor, FLAG1, FLAG2};
use crate::error::{WsiError, WsiResult};
use crate::navigation::lambert_projection;
use crate::projection::EARTH_RADIUS_KM;
use crate::rle::RunLengthDecoder;
use crate::types::*;

pub const TRANS_COMPLETE_FLAG: u8 = 0x02;
pub const LABEL_FLAG: u8 = 0x03;
pub const STATUS_FLAG: u8 = 0x06;
pub const HEADER_FLAG: u8 = 0x09;
pub const IMAGE_SIZE_FLAG: u8 = 0x0A;
pub const PROJ_NAV_FLAG: u8 = 0x0B;
pub const IMAGE_LINE_FLAG: u8 = 0x0C;

/// Range of the optional mark byte after the header text.
pub const MARK_MIN: u8 = 0x80;
pub const MARK_MAX: u8 = 0x82;

/// Largest image dimension; line numbers are 16 bit.
pub const MAX_IMAGE_DIM: u32 = 65_536;

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Parser for one buffered WSI file.
///
/// Fills a [`WsiHeader`] and the [`NativeImage`] while walking the
/// segments. Call [`SegmentParser::into_parts`] afterwards to take both,
/// including whatever was read before a failure.
pub struct SegmentParser<'a> {
    /// The byte cursor over the file.
    cursor: ByteCursor<'a>,
    /// Calibration applied to decoded colors.
    color_table: &'a ColorTable,
    /// Header information read so far.
    header: WsiHeader,
    /// Image buffer, present once a valid image size was read.
    image: Option<NativeImage>,
    /// Last image line accepted.
    last_line: Option<u16>,
}

impl<'a> SegmentParser<'a> {
    pub fn new(data: &'a [u8], color_table: &'a ColorTable) -> Self {
        Self {
            cursor: ByteCursor::new(data),
            color_table,
            header: WsiHeader::default(),
            image: None,
            last_line: None,
        }
    }

    /// Walks all segments up to the transmission complete command and
    /// derives the data time.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A segment does not start with the flag sequence
    /// - The data ends before the transmission complete command
    /// - A navigation segment has too few fields
    /// - The data time cannot be derived from the label and header
    pub fn parse(&mut self) -> WsiResult<()> {
        if self.cursor.is_empty() {
            return Err(WsiError::EmptyInput);
        }
        debug!("Parsing {} bytes", self.cursor.len());

        loop {
            let position = self.cursor.position();
            let flags = self.cursor.read_bytes(2)?;
            if flags != [FLAG1, FLAG2] {
                return Err(WsiError::InvalidFlag {
                    position,
                    found: [flags[0], flags[1]],
                });
            }

            let command = self.cursor.read_u8()?;
            match command {
                TRANS_COMPLETE_FLAG => {
                    debug!("Transmission complete at byte {}", position);
                    break;
                }
                LABEL_FLAG => self.read_label()?,
                STATUS_FLAG => self.read_status()?,
                HEADER_FLAG => self.read_header()?,
                IMAGE_SIZE_FLAG => self.read_image_size()?,
                PROJ_NAV_FLAG => self.read_projection()?,
                IMAGE_LINE_FLAG => self.read_image_line()?,
                other => {
                    warn!(
                        "Invalid WSI command flag {:#04x} at byte {}, skipping to next command flag",
                        other,
                        position + 2
                    );
                    self.cursor.skip_to_segment_flag()?;
                }
            }
        }

        let data_time = derive_data_time(&self.header.image_label, &self.header.image_header)?;
        info!("Data time: {}", data_time);
        self.header.data_time = Some(data_time);

        Ok(())
    }

    /// Consumes the parser, returning the header and image.
    pub fn into_parts(self) -> (WsiHeader, Option<NativeImage>) {
        (self.header, self.image)
    }

    /// Label: a fixed 80 character ASCII string.
    fn read_label(&mut self) -> WsiResult<()> {
        let bytes = self.cursor.read_bytes(IMAGE_LABEL_LEN)?;
        self.header.image_label = ascii_text(bytes);
        debug!("Label: <{}>", self.header.image_label);
        Ok(())
    }

    /// Status: a broadcast service message, skipped.
    fn read_status(&mut self) -> WsiResult<()> {
        let message = self.cursor.skip_to_segment_flag()?;
        debug!("Skipping {} byte broadcast status message", message.len());
        Ok(())
    }

    /// Header: a count byte, that many ASCII characters, an optional mark
    /// byte and the start of image (resolution) byte.
    fn read_header(&mut self) -> WsiResult<()> {
        let size = self.cursor.read_u8()? as usize;
        let text = self.cursor.read_bytes(size)?;
        self.header.image_header = ascii_text(text);
        debug!("Header ({} bytes): <{}>", size, self.header.image_header);

        let next = self.cursor.peek_u8()?;
        self.header.mark = if (MARK_MIN..=MARK_MAX).contains(&next) {
            self.cursor.skip(1)?;
            debug!("Mark byte: {}", next);
            next
        } else {
            0
        };

        self.header.resolution_byte = self.cursor.read_u8()?;
        debug!("Resolution byte: {}", self.header.resolution_byte);
        Ok(())
    }

    /// Image size: ASCII line count, a space, ASCII pixel count.
    fn read_image_size(&mut self) -> WsiResult<()> {
        let text = ascii_text(self.cursor.skip_to_segment_flag()?);
        let mut fields = text.split_ascii_whitespace().map(leading_int);
        let lines = fields.next().flatten().unwrap_or(0);
        let pixels = fields.next().flatten().unwrap_or(0);

        let to_u32 = |v: i64| u32::try_from(v).unwrap_or(0);
        self.header.image_lines = to_u32(lines);
        self.header.image_pixels = to_u32(pixels);

        if self.header.has_valid_size() {
            let (lines, pixels) = (self.header.image_lines, self.header.image_pixels);
            let too_large = lines > MAX_IMAGE_DIM
                || pixels > MAX_IMAGE_DIM
                || (lines as usize).checked_mul(pixels as usize).is_none();
            if too_large {
                self.image = None;
                return Err(WsiError::MalformedSegment {
                    segment: "image size",
                    reason: format!(
                        "{} lines x {} pixels exceeds {} per dimension",
                        lines, pixels, MAX_IMAGE_DIM
                    ),
                });
            }
            info!(
                "Image size: {} lines x {} pixels",
                self.header.image_lines, self.header.image_pixels
            );
            self.image = Some(NativeImage::new(
                self.header.image_lines as usize,
                self.header.image_pixels as usize,
            ));
        } else {
            warn!("Invalid image size segment: <{}>", text);
            self.image = None;
        }
        Ok(())
    }

    /// Projection and navigation: a nav code letter followed by
    /// space-separated values in radians.
    fn read_projection(&mut self) -> WsiResult<()> {
        let code = self.cursor.read_u8()? as char;
        let text = ascii_text(self.cursor.skip_to_segment_flag()?);
        debug!("Navigation segment: <{}{}>", code, text);

        self.header.nav_code = Some(code);
        self.header.navigation = match code {
            'C' => {
                let v = nav_values::<5>(&text)?;
                let nav = CylindricalNav {
                    center_lon: v[0].to_degrees(),
                    top_lat: v[1].to_degrees(),
                    diff_lon: v[2].to_degrees().abs(),
                    deg_per_line: v[3].to_degrees(),
                    deg_per_element: v[4].to_degrees(),
                };
                info!("Cylindrical equidistant navigation: {:?}", nav);
                Some(Navigation::CylindricalEquidistant(nav))
            }
            'L' => {
                let v = nav_values::<8>(&text)?;
                let nav = LambertNav {
                    parallel_1: v[0].to_degrees(),
                    parallel_2: v[1].to_degrees(),
                    proj_center_lat: v[2].to_degrees(),
                    proj_center_lon: v[3].to_degrees(),
                    upper_left_y: v[4] * EARTH_RADIUS_KM,
                    upper_left_x: v[5] * EARTH_RADIUS_KM,
                    pixel_res_y: v[6] * EARTH_RADIUS_KM,
                    pixel_res_x: v[7] * EARTH_RADIUS_KM,
                };
                info!("Lambert conformal navigation: {:?}", nav);
                if lambert_projection(&nav).is_some() {
                    Some(Navigation::LambertConformal(nav))
                } else {
                    warn!("Lambert conformal parameters do not define a projection");
                    None
                }
            }
            other => {
                warn!("Don't know how to process nav_code {:?} data, skipping", other);
                None
            }
        };
        Ok(())
    }

    /// Image line: little-endian line number followed by run length data.
    fn read_image_line(&mut self) -> WsiResult<()> {
        let line_num = self.cursor.read_u16_le()?;

        if let Some(last) = self.last_line.filter(|&last| line_num <= last) {
            warn!(
                "Line number {} encountered after line {}, skipping line",
                line_num, last
            );
            self.cursor.skip_to_segment_flag()?;
            return Ok(());
        }

        let runs = RunLengthDecoder::new(&mut self.cursor).decode_line()?;
        self.last_line = Some(line_num);

        let Some(image) = self.image.as_mut() else {
            warn!("Image line {} before a valid image size, dropping", line_num);
            return Ok(());
        };

        let mut column = 0usize;
        for run in &runs {
            let length = run.length as usize;
            image.fill_run(
                line_num as usize,
                column,
                length,
                self.color_table.lookup(run.color),
            );
            column += length;
        }
        trace!("Line {}: {} runs, {} columns", line_num, runs.len(), column);

        if column != image.pixels() {
            debug!(
                "Line {} had {} columns, should have {} columns",
                line_num,
                column,
                image.pixels()
            );
        }
        Ok(())
    }
}

/// Text of a fixed-size ASCII field, cut at the first NUL.
fn ascii_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Integer prefix of a token, the way `atoi` reads it.
fn leading_int(token: &str) -> Option<i64> {
    let digits_end = token
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(token.len(), |(i, _)| i);
    token[..digits_end].parse().ok()
}

/// Floating point prefix of a token, the way `atof` reads it.
fn leading_float(token: &str) -> Option<f64> {
    (1..=token.len())
        .rev()
        .filter(|&end| token.is_char_boundary(end))
        .find_map(|end| token[..end].parse().ok())
}

/// The first `N` numeric fields of a navigation segment.
fn nav_values<const N: usize>(text: &str) -> WsiResult<[f64; N]> {
    let mut values = [0.0; N];
    let mut fields = text.split_ascii_whitespace().map(leading_float);
    for (i, value) in values.iter_mut().enumerate() {
        *value = fields
            .next()
            .flatten()
            .ok_or_else(|| WsiError::MalformedSegment {
                segment: "navigation",
                reason: format!("expected {} numeric fields, field {} missing or invalid", N, i + 1),
            })?;
    }
    Ok(values)
}

/// Derives the data time of a file.
///
/// The label holds the date as `DD-MMM-YY` after a colon, and the header
/// holds the time as `hh:mm`. Two digit years below 50 are 20xx.
///
/// # Errors
///
/// Returns `WsiError::MissingDataTime` if either field has no colon and
/// `WsiError::InvalidDataTime` if the text around it does not parse.
pub fn derive_data_time(label: &str, header: &str) -> WsiResult<DateTime<Utc>> {
    let label_colon = label.find(':').ok_or(WsiError::MissingDataTime("label"))?;
    let (day, month, year) = label[label_colon + 1..]
        .split_ascii_whitespace()
        .find_map(parse_date_token)
        .ok_or_else(|| WsiError::InvalidDataTime(format!("no date in label <{}>", label)))?;

    let header_colon = header.find(':').ok_or(WsiError::MissingDataTime("header"))?;
    let hour = digits_before(&header[..header_colon]);
    let minute = digits_after(&header[header_colon + 1..]);
    let (Some(hour), Some(minute)) = (hour, minute) else {
        return Err(WsiError::InvalidDataTime(format!(
            "no hh:mm in header <{}>",
            header
        )));
    };

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| {
            WsiError::InvalidDataTime(format!(
                "{}-{:02}-{:02} {:02}:{:02}",
                year, month, day, hour, minute
            ))
        })
}

/// Parses `D[D]-MMM-YY[YY]`, returning `(day, month, year)`.
fn parse_date_token(token: &str) -> Option<(u32, u32, i32)> {
    let mut parts = token.splitn(3, '-');
    let day = parts.next()?;
    let month = parts.next()?;
    let year = parts.next()?;

    if day.is_empty() || day.len() > 2 || !day.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let day: u32 = day.parse().ok()?;

    let month = month.get(..3)?.to_ascii_lowercase();
    let month = MONTHS.iter().position(|m| *m == month)? as u32 + 1;

    let year_digits: String = year.chars().take_while(|c| c.is_ascii_digit()).collect();
    let year: i32 = year_digits.parse().ok()?;
    let year = match year {
        0..=49 => year + 2000,
        50..=99 => year + 1900,
        _ => year,
    };

    Some((day, month, year))
}

fn digits_before(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .rev()
        .take(2)
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

fn digits_after(text: &str) -> Option<u32> {
    let digits: String = text.chars().take(2).take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
