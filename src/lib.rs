//! # WSIM - WSI NOWrad Mosaic Decoder
//!
//! A library for decoding WSI NOWrad radar mosaic files and resampling them
//! onto a regular output grid.
//!
//! A WSI file is a sequence of flag-delimited segments: a product label, a
//! header with the broadcast time, the image size, the projection and
//! navigation, and run-length coded image lines. The native image is
//! calibrated through a 15 value table and either passed through or
//! resampled onto a lat/lon or flat-earth grid.
//!
//! ## Example
//!
//! ```rust,ignore
//! use wsim::{read_input, Params, WsiFile};
//!
//! let params = Params::from_file("wsim.json")?;
//! let mut wsi = WsiFile::new(params.color_table()?, params.output_spec());
//! let grid = wsi.read(&read_input("nowrad.wsi.gz")?)?;
//! println!("{} x {} grid at {}", grid.nx, grid.ny, grid.data_time);
//! ```

pub mod color;
pub mod config;
pub mod cursor;
pub mod error;
pub mod navigation;
pub mod parser;
pub mod projection;
pub mod resample;
pub mod rle;
pub mod sink;
pub mod source;
pub mod types;
pub mod wsi_file;

// Re-export main types for convenient access
pub use color::ColorTable;
pub use config::Params;
pub use cursor::ByteCursor;
pub use error::{WsiError, WsiResult};
pub use navigation::NavigationModel;
pub use parser::{derive_data_time, SegmentParser};
pub use resample::{GridResampler, ResampledGrid};
pub use rle::{Run, RunLengthDecoder, RunLengthEncoder};
pub use sink::{GridSink, RawGridSink};
pub use source::read_input;
pub use types::*;
pub use wsi_file::WsiFile;
