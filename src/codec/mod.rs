//! Image codec boundary: ImageMagick behind a trait.
//!
//! | Operation | Codec call |
//! |---|---|
//! | **Availability** | `magick`/`convert` found on `PATH` |
//! | **Capability** | `-list format`, HEIC row readable |
//! | **Transcode** | `<source>[0] WEBP:<output>` / `JPEG:<output>` |
//! | **Identify** | `-format "%w %h" info:` |
//!
//! The module is split into:
//! - **Backend**: [`Codec`] trait + [`Dimensions`] + [`CodecError`]
//! - **Parameters**: [`TranscodeParams`] describing one transcode
//! - **Classify**: the single place codec error text is interpreted
//! - **Magick**: [`MagickCodec`], the production implementation

pub mod backend;
pub mod classify;
pub mod magick;
mod params;

pub use backend::{Codec, CodecError, Dimensions};
pub use classify::{CodecFailure, HEIC_DELEGATE_MISSING, classify_codec_error};
pub use magick::MagickCodec;
pub use params::TranscodeParams;
