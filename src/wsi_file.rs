//! Decoding of complete WSI files onto the output grid.

use std::fmt;
use std::time::Instant;

use tracing::{debug, info};

use crate::color::ColorTable;
use crate::error::{WsiError, WsiResult};
use crate::parser::SegmentParser;
use crate::resample::GridResampler;
use crate::types::{DecodedGrid, GridGeometry, Navigation, OutputGridSpec, OutputProjection, WsiHeader};

/// Decoder for a stream of WSI files sharing one calibration and one
/// output grid.
///
/// # Example
///
/// ```ignore
/// use wsim::{ColorTable, WsiFile};
///
/// let table = ColorTable::new(&values, 0.5, -32.0)?;
/// let mut wsi = WsiFile::new(table, spec);
/// let grid = wsi.read(&bytes)?;
/// ```
#[derive(Debug, Clone)]
pub struct WsiFile {
    color_table: ColorTable,
    resampler: GridResampler,
    /// Header of the most recent read, kept even if the read failed.
    header: WsiHeader,
    /// Geometry of the most recent output grid.
    output_geometry: GridGeometry,
}

impl WsiFile {
    pub fn new(color_table: ColorTable, output_spec: OutputGridSpec) -> Self {
        Self {
            color_table,
            output_geometry: output_spec.geometry,
            resampler: GridResampler::new(output_spec),
            header: WsiHeader::default(),
        }
    }

    /// Decodes one complete file buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed, has no valid image
    /// size, or its navigation cannot be mapped onto the output grid.
    pub fn read(&mut self, bytes: &[u8]) -> WsiResult<DecodedGrid> {
        let start = Instant::now();

        let mut parser = SegmentParser::new(bytes, &self.color_table);
        let result = parser.parse();
        let (header, image) = parser.into_parts();
        self.header = header;
        result?;

        let image = image.ok_or(WsiError::MissingImageSize)?;
        let data_time = self
            .header
            .data_time
            .ok_or(WsiError::MissingDataTime("header"))?;

        let grid = self
            .resampler
            .resample(&image, self.header.navigation.as_ref())?;
        self.output_geometry = grid.geometry;

        let geometry = grid.geometry;
        let (origin_lat, origin_lon) = match self.resampler.spec().projection {
            OutputProjection::Flat {
                origin_lat,
                origin_lon,
            } if self.resampler.spec().resample => (origin_lat, origin_lon),
            _ => (geometry.min_y, geometry.min_x),
        };

        info!(
            "Decoded {} x {} grid for {}",
            geometry.nx, geometry.ny, data_time
        );
        debug!("Decoding took {:?}", start.elapsed());

        Ok(DecodedGrid {
            data: grid.data,
            nx: geometry.nx,
            ny: geometry.ny,
            min_x: geometry.min_x,
            min_y: geometry.min_y,
            delta_x: geometry.delta_x,
            delta_y: geometry.delta_y,
            origin_lat,
            origin_lon,
            data_time,
        })
    }

    /// Header of the most recent read.
    pub fn header(&self) -> &WsiHeader {
        &self.header
    }

    /// Human readable dump of the last parsed header and output grid.
    pub fn header_debug_string(&self) -> String {
        HeaderDump {
            header: &self.header,
            output: &self.output_geometry,
        }
        .to_string()
    }
}

struct HeaderDump<'a> {
    header: &'a WsiHeader,
    output: &'a GridGeometry,
}

impl fmt::Display for HeaderDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.header;

        writeln!(f, "WSI header:")?;
        match header.data_time {
            Some(time) => writeln!(f, "   data_time = {}", time.format("%Y/%m/%d %H:%M:%S"))?,
            None => writeln!(f, "   data_time = unknown")?,
        }
        writeln!(f)?;

        match header.navigation.map(|nav| nav.code()).or(header.nav_code) {
            Some(code) => writeln!(f, "   nav_code = {}", code)?,
            None => writeln!(f, "   nav_code = none")?,
        }
        match &header.navigation {
            Some(Navigation::CylindricalEquidistant(nav)) => {
                writeln!(f, "   center_lon = {:.6} deg", nav.center_lon)?;
                writeln!(f, "   top_lat = {:.6} deg", nav.top_lat)?;
                writeln!(f, "   diff_lon = {:.6} deg", nav.diff_lon)?;
                writeln!(f, "   deg_per_line = {:.6} deg", nav.deg_per_line)?;
                writeln!(f, "   deg_per_element = {:.6} deg", nav.deg_per_element)?;
            }
            Some(Navigation::LambertConformal(nav)) => {
                writeln!(f, "   parallel_1 = {:.6} deg", nav.parallel_1)?;
                writeln!(f, "   parallel_2 = {:.6} deg", nav.parallel_2)?;
                writeln!(f, "   proj_center_lat = {:.6} deg", nav.proj_center_lat)?;
                writeln!(f, "   proj_center_lon = {:.6} deg", nav.proj_center_lon)?;
                writeln!(f, "   upper_left_x = {:.6} km", nav.upper_left_x)?;
                writeln!(f, "   upper_left_y = {:.6} km", nav.upper_left_y)?;
                writeln!(f, "   pixel_res_x = {:.6} km", nav.pixel_res_x)?;
                writeln!(f, "   pixel_res_y = {:.6} km", nav.pixel_res_y)?;
            }
            None if matches!(header.nav_code, Some('C' | 'L')) => {
                writeln!(f, "   *** NAVIGATION PARAMETERS REJECTED ***")?
            }
            None => writeln!(f, "   *** UNKNOWN NAV CODE ***")?,
        }
        writeln!(f)?;

        writeln!(f, "   image_header = {}", header.image_header)?;
        writeln!(f, "   mark = {}", header.mark)?;
        writeln!(f, "   resolution_byte = {}", header.resolution_byte)?;
        writeln!(f)?;
        writeln!(f, "   image_lines = {}", header.image_lines)?;
        writeln!(f, "   image_pixels = {}", header.image_pixels)?;
        writeln!(f)?;
        writeln!(f, "   image_label = {}", header.image_label.trim_end())?;
        writeln!(f)?;

        let output = self.output;
        writeln!(f, "Output grid:")?;
        writeln!(f, "   output_min_x = {:.6}", output.min_x)?;
        writeln!(f, "   output_min_y = {:.6}", output.min_y)?;
        writeln!(f, "   output_delta_x = {:.6}", output.delta_x)?;
        writeln!(f, "   output_delta_y = {:.6}", output.delta_y)?;
        writeln!(f, "   output_nx = {}", output.nx)?;
        writeln!(f, "   output_ny = {}", output.ny)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{FLAG1, FLAG2};
    use crate::parser::{
        HEADER_FLAG, IMAGE_LINE_FLAG, IMAGE_SIZE_FLAG, LABEL_FLAG, PROJ_NAV_FLAG,
        TRANS_COMPLETE_FLAG,
    };
    use crate::rle::{Run, RunLengthEncoder};
    use crate::types::{FilterType, IMAGE_LABEL_LEN};
    use pretty_assertions::assert_eq;

    fn color_table() -> ColorTable {
        let mut values: Vec<f64> = (1..=15).map(|i| i as f64 * 5.0).collect();
        values[4] = 35.0;
        ColorTable::new(&values, 0.5, -32.0).unwrap()
    }

    fn segment(command: u8, body: &[u8]) -> Vec<u8> {
        let mut out = vec![FLAG1, FLAG2, command];
        out.extend_from_slice(body);
        out
    }

    /// A 4 line x 6 pixel file at 1 degree spacing covering 103..97 W,
    /// 41..45 N, with line 0 (north) filled with color 5.
    fn ce_file() -> Vec<u8> {
        let nav = format!(
            "C {} {} {} {} {}",
            (-100f64).to_radians(),
            45f64.to_radians(),
            3f64.to_radians(),
            1f64.to_radians(),
            1f64.to_radians()
        );
        file_with_navigation(&nav)
    }

    fn file_with_navigation(nav: &str) -> Vec<u8> {
        let mut label = b"NOWRAD :15-Jan-04".to_vec();
        label.resize(IMAGE_LABEL_LEN, b' ');
        let mut data = segment(LABEL_FLAG, &label);

        let text = b"US 18:30 NOWRADHD";
        let mut body = vec![text.len() as u8];
        body.extend_from_slice(text);
        body.push(0x01);
        data.extend(segment(HEADER_FLAG, &body));

        data.extend(segment(IMAGE_SIZE_FLAG, b"4 6"));
        data.extend(segment(PROJ_NAV_FLAG, nav.as_bytes()));

        let mut line = 0u16.to_le_bytes().to_vec();
        line.extend(RunLengthEncoder::encode_line(&[Run::new(5, 6)]));
        data.extend(segment(IMAGE_LINE_FLAG, &line));

        data.extend(segment(TRANS_COMPLETE_FLAG, &[]));
        data
    }

    fn spec(resample: bool, projection: OutputProjection) -> OutputGridSpec {
        OutputGridSpec {
            resample,
            projection,
            geometry: GridGeometry {
                nx: 3,
                ny: 2,
                min_x: -102.0,
                min_y: 42.0,
                delta_x: 2.0,
                delta_y: 2.0,
            },
            filter: FilterType::Max,
            coverage_threshold: 0.0,
            data_scale: 0.5,
            data_bias: -32.0,
        }
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} vs {}", a, b);
    }

    #[test]
    fn test_read_pass_through() {
        let mut wsi = WsiFile::new(color_table(), spec(false, OutputProjection::LatLon));
        let grid = wsi.read(&ce_file()).unwrap();

        assert_eq!((grid.nx, grid.ny), (6, 4));
        assert_close(grid.min_x, -102.5);
        assert_close(grid.min_y, 41.5);
        assert_close(grid.delta_x, 1.0);
        assert_eq!(&grid.data[18..], &[134; 6]);
        assert_eq!(&grid.data[..18], &[0; 18]);
        assert_eq!((grid.origin_lat, grid.origin_lon), (grid.min_y, grid.min_x));
        assert_eq!(grid.data_time.to_string(), "2004-01-15 18:30:00 UTC");
    }

    #[test]
    fn test_read_statistical() {
        let mut wsi = WsiFile::new(color_table(), spec(true, OutputProjection::LatLon));
        let grid = wsi.read(&ce_file()).unwrap();

        assert_eq!((grid.nx, grid.ny), (3, 2));
        assert_eq!(grid.data, vec![0, 0, 0, 134, 134, 134]);
        assert_eq!((grid.origin_lat, grid.origin_lon), (42.0, -102.0));
    }

    #[test]
    fn test_read_flat_reports_flat_origin() {
        let projection = OutputProjection::Flat {
            origin_lat: 44.5,
            origin_lon: -100.0,
        };
        let mut output = spec(true, projection);
        output.geometry = GridGeometry {
            nx: 1,
            ny: 1,
            min_x: 0.0,
            min_y: 0.0,
            delta_x: 10.0,
            delta_y: 10.0,
        };
        let mut wsi = WsiFile::new(color_table(), output);
        let grid = wsi.read(&ce_file()).unwrap();

        assert_eq!(grid.data, vec![134]);
        assert_eq!((grid.origin_lat, grid.origin_lon), (44.5, -100.0));
    }

    #[test]
    fn test_missing_image_size() {
        // Turn the image size segment into an unknown command.
        let mut data = ce_file();
        let start = data
            .windows(3)
            .position(|w| w == [FLAG1, FLAG2, IMAGE_SIZE_FLAG])
            .unwrap();
        data[start + 2] = 0x0D;

        let mut wsi = WsiFile::new(color_table(), spec(false, OutputProjection::LatLon));
        assert!(matches!(wsi.read(&data), Err(WsiError::MissingImageSize)));
    }

    #[test]
    fn test_header_kept_after_failure() {
        let mut data = ce_file();
        data.truncate(data.len() - 3);
        let mut wsi = WsiFile::new(color_table(), spec(false, OutputProjection::LatLon));

        assert!(matches!(
            wsi.read(&data),
            Err(WsiError::UnexpectedEnd { .. })
        ));
        assert_eq!(wsi.header().image_header, "US 18:30 NOWRADHD");
        assert_eq!(wsi.header().image_lines, 4);
    }

    #[test]
    fn test_header_debug_string() {
        let mut wsi = WsiFile::new(color_table(), spec(false, OutputProjection::LatLon));
        wsi.read(&ce_file()).unwrap();
        let dump = wsi.header_debug_string();

        assert!(dump.contains("   data_time = 2004/01/15 18:30:00\n"));
        assert!(dump.contains("   nav_code = C\n"));
        assert!(dump.contains("   center_lon = -100.000000 deg\n"));
        assert!(dump.contains("   image_header = US 18:30 NOWRADHD\n"));
        assert!(dump.contains("   image_label = NOWRAD :15-Jan-04\n"));
        assert!(dump.contains("   output_nx = 6\n"));
        assert!(dump.ends_with("   output_ny = 4\n"));
    }

    #[test]
    fn test_header_debug_string_rejected_lambert() {
        // Parallels symmetric about the equator do not form a cone.
        let nav = format!(
            "L {} {} {} {} 0.01 -0.01 0.001 0.001",
            30f64.to_radians(),
            (-30f64).to_radians(),
            0.0,
            (-98f64).to_radians()
        );
        let mut wsi = WsiFile::new(color_table(), spec(true, OutputProjection::LatLon));
        assert!(matches!(
            wsi.read(&file_with_navigation(&nav)),
            Err(WsiError::NavigationUnavailable)
        ));

        let dump = wsi.header_debug_string();
        assert!(dump.contains("   nav_code = L\n"));
        assert!(dump.contains("   *** NAVIGATION PARAMETERS REJECTED ***\n"));
        assert!(!dump.contains("UNKNOWN NAV CODE"));
    }

    #[test]
    fn test_header_debug_string_unknown_code() {
        let mut wsi = WsiFile::new(color_table(), spec(true, OutputProjection::LatLon));
        assert!(wsi.read(&file_with_navigation("P 1.0 2.0")).is_err());

        let dump = wsi.header_debug_string();
        assert!(dump.contains("   nav_code = P\n"));
        assert!(dump.contains("   *** UNKNOWN NAV CODE ***\n"));
    }
}
