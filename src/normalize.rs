//! Per-file normalization: PNG conversion followed by budgeted compression
//!
//! Nothing here fails. Codec errors fall back to whatever the file looked
//! like before the failing step, and the fallback is recorded as a
//! [`Degradation`] on the result.

use crate::codec::{Encoded, ImageCodec, ReencodeOptions};
use crate::config::Settings;
use crate::intake::RawFile;
use crate::media::{replace_extension, MediaType};
use crate::retry::{BoundedRetry, StopReason};
use std::fmt;
use tracing::{debug, warn};

/// Why a result is worse than asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    /// PNG to JPEG conversion failed; the PNG was kept.
    ConversionFailed { reason: String },
    /// A compression attempt failed and the loop stopped there.
    ReencodeFailed { attempt: usize, reason: String },
    /// Every attempt ran and the file is still over budget.
    OverBudget { attempts: usize },
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConversionFailed { reason } => write!(f, "PNG conversion failed: {}", reason),
            Self::ReencodeFailed { attempt, reason } => {
                write!(f, "compression attempt {} failed: {}", attempt, reason)
            }
            Self::OverBudget { attempts } => {
                write!(f, "still over budget after {} attempts", attempts)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFile {
    pub name: String,
    pub group: String,
    pub media_type: MediaType,
    pub data: Vec<u8>,
    /// Size of the selected file, before conversion.
    pub original_size: u64,
    pub compressed_size: u64,
    /// The file went through the compression loop, whether or not an attempt succeeded.
    pub is_compressed: bool,
    pub converted: bool,
    pub attempts: usize,
    pub degradation: Option<Degradation>,
}

impl NormalizedFile {
    pub fn is_degraded(&self) -> bool {
        self.degradation.is_some()
    }
}

pub struct Normalizer<C> {
    codec: C,
    settings: Settings,
}

impl<C: ImageCodec> Normalizer<C> {
    pub fn new(codec: C, settings: Settings) -> Self {
        Self { codec, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The quality schedule the compression loop walks through.
    pub fn quality_retry(&self) -> BoundedRetry<u8, impl Fn(u8) -> u8> {
        let step = self.settings.quality_step;
        BoundedRetry::new(
            self.settings.initial_quality.clamp(1, 100),
            self.settings.max_attempts,
            move |quality: u8| quality.saturating_sub(step).max(1),
        )
    }

    pub fn normalize(&self, file: RawFile) -> NormalizedFile {
        let original_size = file.size();
        let group = file.group_name().to_string();
        let RawFile {
            mut name,
            mut media_type,
            mut data,
            ..
        } = file;

        let budget = self.settings.size_budget;
        let mut degradation = None;
        let mut converted = false;

        if media_type.is_png() {
            match self
                .codec
                .convert_to_jpeg(&data, self.settings.conversion_quality)
            {
                Ok(jpeg) => {
                    debug!(file = %name, from = data.len(), to = jpeg.len(), "converted PNG to JPEG");
                    name = replace_extension(&name, "jpg");
                    media_type = MediaType::jpeg();
                    data = jpeg;
                    converted = true;
                }
                Err(e) => {
                    warn!(file = %name, "PNG conversion failed, keeping original: {}", e);
                    degradation = Some(Degradation::ConversionFailed {
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !media_type.is_image() || data.len() as u64 <= budget {
            return NormalizedFile {
                name,
                group,
                media_type,
                compressed_size: data.len() as u64,
                data,
                original_size,
                is_compressed: false,
                converted,
                attempts: 0,
                degradation,
            };
        }

        let outcome = self.quality_retry().run(
            |quality| {
                let options = ReencodeOptions {
                    max_output_bytes: self.settings.max_output_bytes,
                    max_dimension: self.settings.max_dimension,
                    quality,
                };
                let result = self.codec.reencode(&data, &media_type, &options);
                if let Ok(encoded) = &result {
                    debug!(file = %name, quality, size = encoded.data.len(), "compression attempt");
                }
                result
            },
            |encoded: &Encoded| encoded.data.len() as u64 <= budget,
        );

        let attempts = outcome.attempts;
        match outcome.stop {
            StopReason::Satisfied => {}
            StopReason::Exhausted => {
                warn!(file = %name, attempts, "could not reach size budget");
                degradation = degradation.or(Some(Degradation::OverBudget { attempts }));
            }
            StopReason::Failed(e) => {
                warn!(file = %name, attempt = attempts, "compression failed, keeping best result: {}", e);
                degradation = degradation.or(Some(Degradation::ReencodeFailed {
                    attempt: attempts,
                    reason: e.to_string(),
                }));
            }
        }

        if let Some(encoded) = outcome.last {
            if encoded.media_type != media_type {
                if let Some(ext) = encoded.media_type.extension() {
                    name = replace_extension(&name, ext);
                }
                media_type = encoded.media_type;
            }
            data = encoded.data;
        }

        NormalizedFile {
            name,
            group,
            media_type,
            compressed_size: data.len() as u64,
            data,
            original_size,
            is_compressed: true,
            converted,
            attempts,
            degradation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use std::io;
    use std::sync::Mutex;

    /// Codec whose output sizes are fixed up front. `None` fails the call.
    struct ScriptedCodec {
        convert: Option<usize>,
        attempts: Vec<Option<usize>>,
        qualities: Mutex<Vec<u8>>,
    }

    impl ScriptedCodec {
        fn new(convert: Option<usize>, attempts: Vec<Option<usize>>) -> Self {
            Self {
                convert,
                attempts,
                qualities: Mutex::new(Vec::new()),
            }
        }

        fn qualities(&self) -> Vec<u8> {
            self.qualities.lock().unwrap().clone()
        }
    }

    fn scripted_failure() -> Error {
        Error::Io(io::Error::new(io::ErrorKind::Other, "scripted failure"))
    }

    impl ImageCodec for ScriptedCodec {
        fn convert_to_jpeg(&self, _data: &[u8], _quality: u8) -> Result<Vec<u8>> {
            self.convert.map(|n| vec![0xFF; n]).ok_or_else(scripted_failure)
        }

        fn reencode(
            &self,
            _data: &[u8],
            media_type: &MediaType,
            options: &ReencodeOptions,
        ) -> Result<Encoded> {
            let mut qualities = self.qualities.lock().unwrap();
            let index = qualities.len();
            qualities.push(options.quality);

            let size = self.attempts.get(index).copied().flatten();
            size.map(|n| Encoded {
                data: vec![0xEE; n],
                media_type: media_type.clone(),
            })
            .ok_or_else(scripted_failure)
        }
    }

    const BUDGET: usize = 500 * 1024;

    fn normalizer(codec: ScriptedCodec) -> Normalizer<ScriptedCodec> {
        Normalizer::new(codec, Settings::default())
    }

    #[test]
    fn non_images_pass_through() {
        let n = normalizer(ScriptedCodec::new(None, vec![]));
        let file = RawFile::new("report.pdf", vec![7; 2 * BUDGET]).with_relative_path("Docs/report.pdf");

        let out = n.normalize(file);
        assert_eq!(out.name, "report.pdf");
        assert_eq!(out.group, "Docs");
        assert!(!out.is_compressed);
        assert_eq!(out.compressed_size, out.original_size);
        assert_eq!(out.data, vec![7; 2 * BUDGET]);
        assert!(n.codec.qualities().is_empty());
    }

    #[test]
    fn small_png_is_converted_but_not_compressed() {
        let n = normalizer(ScriptedCodec::new(Some(8 * 1024), vec![]));
        let out = n.normalize(RawFile::new("icon.png", vec![1; 10 * 1024]));

        assert_eq!(out.name, "icon.jpg");
        assert_eq!(out.media_type, MediaType::jpeg());
        assert!(out.converted);
        assert!(!out.is_compressed);
        assert_eq!(out.original_size, 10 * 1024);
        assert_eq!(out.compressed_size, 8 * 1024);
        assert!(n.codec.qualities().is_empty());
    }

    #[test]
    fn exactly_at_budget_is_left_alone() {
        let n = normalizer(ScriptedCodec::new(None, vec![]));
        let out = n.normalize(RawFile::new("photo.jpg", vec![1; BUDGET]));

        assert!(!out.is_compressed);
        assert_eq!(out.attempts, 0);
    }

    #[test]
    fn large_png_compresses_until_under_budget() {
        let n = normalizer(ScriptedCodec::new(
            Some(3 * BUDGET),
            vec![Some(BUDGET + 1), Some(BUDGET - 1), Some(1)],
        ));
        let out = n.normalize(RawFile::new("big.png", vec![1; 2 * 1024 * 1024]));

        assert_eq!(out.name, "big.jpg");
        assert!(out.is_compressed);
        assert_eq!(out.attempts, 2);
        assert_eq!(out.compressed_size, (BUDGET - 1) as u64);
        assert_eq!(out.original_size, 2 * 1024 * 1024);
        assert_eq!(n.codec.qualities(), vec![90, 70]);
        assert!(out.degradation.is_none());
    }

    #[test]
    fn gives_up_after_five_attempts() {
        let sizes = vec![Some(BUDGET * 5), Some(BUDGET * 4), Some(BUDGET * 3), Some(BUDGET * 2), Some(BUDGET + 10)];
        let n = normalizer(ScriptedCodec::new(None, sizes));
        let out = n.normalize(RawFile::new("huge.jpg", vec![1; BUDGET * 6]));

        assert_eq!(n.codec.qualities(), vec![90, 70, 50, 30, 10]);
        assert!(out.is_compressed);
        assert_eq!(out.attempts, 5);
        assert_eq!(out.compressed_size, (BUDGET + 10) as u64);
        assert_eq!(out.degradation, Some(Degradation::OverBudget { attempts: 5 }));
    }

    #[test]
    fn failed_attempt_keeps_previous_result() {
        let n = normalizer(ScriptedCodec::new(
            None,
            vec![Some(BUDGET * 3), Some(BUDGET * 2), None, Some(1)],
        ));
        let out = n.normalize(RawFile::new("huge.jpg", vec![1; BUDGET * 6]));

        assert_eq!(n.codec.qualities(), vec![90, 70, 50]);
        assert!(out.is_compressed);
        assert_eq!(out.compressed_size, (BUDGET * 2) as u64);
        assert!(matches!(
            out.degradation,
            Some(Degradation::ReencodeFailed { attempt: 3, .. })
        ));
    }

    #[test]
    fn first_attempt_failure_returns_input() {
        let n = normalizer(ScriptedCodec::new(None, vec![None]));
        let out = n.normalize(RawFile::new("huge.jpg", vec![3; BUDGET * 2]));

        assert!(out.is_compressed);
        assert_eq!(out.attempts, 1);
        assert_eq!(out.data, vec![3; BUDGET * 2]);
        assert_eq!(out.compressed_size, out.original_size);
        assert!(matches!(
            out.degradation,
            Some(Degradation::ReencodeFailed { attempt: 1, .. })
        ));
    }

    #[test]
    fn conversion_failure_keeps_png() {
        let n = normalizer(ScriptedCodec::new(None, vec![]));
        let out = n.normalize(RawFile::new("broken.png", vec![9; 1024]));

        assert_eq!(out.name, "broken.png");
        assert_eq!(out.media_type, MediaType::png());
        assert!(!out.converted);
        assert!(!out.is_compressed);
        assert!(matches!(out.degradation, Some(Degradation::ConversionFailed { .. })));
    }

    #[test]
    fn codec_format_change_renames() {
        struct ToJpeg;
        impl ImageCodec for ToJpeg {
            fn convert_to_jpeg(&self, _: &[u8], _: u8) -> Result<Vec<u8>> {
                Err(scripted_failure())
            }
            fn reencode(&self, _: &[u8], _: &MediaType, _: &ReencodeOptions) -> Result<Encoded> {
                Ok(Encoded {
                    data: vec![0; 10],
                    media_type: MediaType::jpeg(),
                })
            }
        }

        let n = Normalizer::new(ToJpeg, Settings::default());
        let out = n.normalize(RawFile::new("scan.bmp", vec![0; BUDGET * 2]));
        assert_eq!(out.name, "scan.jpg");
        assert_eq!(out.media_type, MediaType::jpeg());
        assert_eq!(out.attempts, 1);
    }

    #[test]
    fn schedule_stays_in_range() {
        let n = Normalizer::new(
            ScriptedCodec::new(None, vec![]),
            Settings {
                max_attempts: 7,
                ..Settings::default()
            },
        );
        assert_eq!(n.quality_retry().schedule(), vec![90, 70, 50, 30, 10, 1, 1]);
    }
}
