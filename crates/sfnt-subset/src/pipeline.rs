//! Subset / hint stripping / encoding pipeline.

use std::{
    borrow::Cow,
    fs,
    path::Path,
    time::{Duration, Instant},
};

use crate::{
    hints::strip_hints, CmapId, ConfigError, Error, Font, FontSubset, GlyphSet, OutputFormat,
    RemovalSet, Repertoire,
};

/// Number of pipeline iterations in the benchmark mode.
pub const BENCHMARK_ITERATIONS: usize = 10_000;

/// Raw pipeline options as they are provided by the user (e.g., via command-line args).
///
/// Options are validated by converting them to a [`PipelineConfig`].
#[derive(Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)] // mirrors command-line flags
pub struct PipelineOptions {
    /// Characters to subset the font to, in the `\uXXXX` escape syntax
    /// (see [`Repertoire::from_escaped()`]). If not set, the font is not subsetted.
    pub subset_string: Option<String>,
    /// Strip TrueType hinting instructions.
    pub strip_hints: bool,
    /// Output WOFF 1.0.
    pub woff: bool,
    /// Output WOFF2.
    pub woff2: bool,
    /// Output Embedded OpenType.
    pub eot: bool,
    /// Apply MicroType Express compression. Only has effect together with [`Self::eot`].
    pub mtx: bool,
    /// Run the pipeline [`BENCHMARK_ITERATIONS`] times.
    pub bench: bool,
}

/// Validated pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    repertoire: Option<Repertoire>,
    strip_hints: bool,
    format: OutputFormat,
    iterations: usize,
    cmap_ids: Vec<CmapId>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            repertoire: None,
            strip_hints: false,
            format: OutputFormat::Sfnt,
            iterations: 1,
            cmap_ids: vec![CmapId::WINDOWS_BMP],
        }
    }
}

impl PipelineConfig {
    /// Validates the provided options.
    ///
    /// # Errors
    ///
    /// Returns an error if several output formats are requested, or the subset string
    /// is malformed.
    pub fn new(options: &PipelineOptions) -> Result<Self, ConfigError> {
        let requested_formats = [
            (options.woff, OutputFormat::Woff),
            (options.woff2, OutputFormat::Woff2),
            (options.eot, OutputFormat::Eot { mtx: options.mtx }),
        ];
        let mut requested_formats = requested_formats
            .into_iter()
            .filter_map(|(flag, format)| flag.then_some(format));
        let format = requested_formats.next().unwrap_or_default();
        if let Some(second) = requested_formats.next() {
            return Err(ConfigError::ConflictingFormats {
                first: format.name(),
                second: second.name(),
            });
        }
        if options.mtx && !options.eot {
            tracing::warn!(%format, "MTX compression is only supported for EOT output; ignoring");
        }

        let repertoire = options
            .subset_string
            .as_deref()
            .map(Repertoire::from_escaped)
            .transpose()?;
        let iterations = if options.bench {
            BENCHMARK_ITERATIONS
        } else {
            1
        };
        Ok(Self {
            repertoire,
            strip_hints: options.strip_hints,
            format,
            iterations,
            ..Self::default()
        })
    }

    /// Sets the repertoire to subset the font to.
    #[must_use]
    pub fn with_repertoire(mut self, repertoire: Repertoire) -> Self {
        self.repertoire = Some(repertoire);
        self
    }

    /// Enables hint stripping.
    #[must_use]
    pub fn with_hint_stripping(mut self) -> Self {
        self.strip_hints = true;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets `cmap` subtables written when subsetting. By default, only a [`CmapId::WINDOWS_BMP`]
    /// subtable is written.
    #[must_use]
    pub fn with_cmap_ids(mut self, ids: &[CmapId]) -> Self {
        self.cmap_ids = ids.to_vec();
        self
    }

    /// Sets the number of pipeline iterations.
    ///
    /// # Errors
    ///
    /// Returns an error if `iterations` is zero.
    pub fn with_iterations(mut self, iterations: usize) -> Result<Self, ConfigError> {
        if iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        self.iterations = iterations;
        Ok(self)
    }

    /// Returns the repertoire to subset the font to, if any.
    pub fn repertoire(&self) -> Option<&Repertoire> {
        self.repertoire.as_ref()
    }

    /// Checks whether hints are stripped.
    pub fn strips_hints(&self) -> bool {
        self.strip_hints
    }

    /// Returns the output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Returns the number of pipeline iterations.
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

/// Outcome of [`Pipeline::run_files()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct RunReport {
    /// Number of performed iterations.
    pub iterations: usize,
    /// Byte length of the output file.
    pub output_len: usize,
    /// Time spent in all iterations, including reading the input font.
    pub elapsed: Duration,
}

/// Font transformation pipeline: subsetting, then hint stripping, then encoding.
/// Each stage is optional except for encoding.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Creates a pipeline with the specified config.
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Returns the pipeline config.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Transforms the font and returns the encoded output. The provided font is not modified.
    ///
    /// # Errors
    ///
    /// Returns an error if the repertoire has no glyphs in the font, or the font misses data
    /// required by one of the stages.
    pub fn transform(&self, font: &Font) -> Result<Vec<u8>, Error> {
        let mut font = Cow::Borrowed(font);
        if let Some(repertoire) = &self.config.repertoire {
            let glyphs = GlyphSet::new(&font, repertoire)?;
            let subset = FontSubset::new(&font, &glyphs)
                .with_cmap_ids(&self.config.cmap_ids)
                .build()?;
            font = Cow::Owned(subset);
        }
        if self.config.strip_hints {
            font = Cow::Owned(strip_hints(&font, RemovalSet::HINT_STRIPPING)?);
        }
        Ok(self.config.format.encode(&font)?)
    }

    /// Reads the first font from `input`, transforms it and writes the result to `output`,
    /// repeating this for the configured number of iterations. Every iteration starts
    /// from the original font and overwrites the output file.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the input or writing the output fails, or if the transformation
    /// fails. On error in a later iteration, the output of the previous iteration is left on disk.
    pub fn run_files(&self, input: &Path, output: &Path) -> Result<RunReport, Error> {
        let span = tracing::info_span!(
            "run_files",
            input = %input.display(),
            output = %output.display(),
            format = %self.config.format,
            iterations = self.config.iterations
        );
        let _entered = span.enter();

        let started_at = Instant::now();
        let bytes = fs::read(input).map_err(|err| Error::io(input, err))?;
        let font = Font::new(&bytes)?;
        tracing::debug!(
            len = bytes.len(),
            tables = font.table_tags().len(),
            "loaded input font"
        );

        let mut output_len = 0;
        for _ in 0..self.config.iterations {
            let encoded = self.transform(&font)?;
            fs::write(output, &encoded).map_err(|err| Error::io(output, err))?;
            output_len = encoded.len();
        }

        let report = RunReport {
            iterations: self.config.iterations,
            output_len,
            elapsed: started_at.elapsed(),
        };
        tracing::info!(
            output_len,
            elapsed = ?report.elapsed,
            "finished processing font"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;
    use crate::{
        font::CmapTable,
        tests::{assert_valid_font, test_font, test_font_bytes},
        ParseErrorKind, TableTag,
    };

    fn options(subset_string: Option<&str>) -> PipelineOptions {
        PipelineOptions {
            subset_string: subset_string.map(str::to_owned),
            ..PipelineOptions::default()
        }
    }

    /// Returns the test font with 9,000 CJK chars mapped to its glyphs. The chars are not adjacent,
    /// so each of them needs a separate segment in a BMP `cmap` subtable.
    fn font_with_sparse_cjk_map() -> (Font, Vec<char>) {
        let chars: Vec<_> = (0..9_000_u32)
            .map(|i| char::from_u32(0x_4e00 + 2 * i).unwrap())
            .collect();
        let char_map: Vec<_> = chars.iter().zip(0_u16..).map(|(&ch, i)| (ch, i % 7 + 1)).collect();
        let mut cmap = vec![];
        CmapTable::write_for_ids(&char_map, &[CmapId::WINDOWS_UCS4], &mut cmap).unwrap();
        let font = test_font().derive([(TableTag::CMAP, cmap)], |_| false);
        (font, chars)
    }

    fn temp_font_dir() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input.ttf");
        fs::write(&input, test_font_bytes()).unwrap();
        (dir, input)
    }

    fn run(options: &PipelineOptions) -> (RunReport, Vec<u8>) {
        let (dir, input) = temp_font_dir();
        let output = dir.path().join("output.bin");
        let config = PipelineConfig::new(options).unwrap();
        let report = Pipeline::new(config).run_files(&input, &output).unwrap();
        let bytes = fs::read(&output).unwrap();
        assert_eq!(report.output_len, bytes.len());
        (report, bytes)
    }

    #[test]
    fn validating_options() {
        let config = PipelineConfig::new(&PipelineOptions::default()).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.iterations(), 1);

        let config = PipelineConfig::new(&PipelineOptions {
            eot: true,
            mtx: true,
            bench: true,
            ..options(Some("\\u41"))
        })
        .unwrap();
        assert_eq!(config.format(), OutputFormat::Eot { mtx: true });
        assert_eq!(config.iterations(), BENCHMARK_ITERATIONS);
        assert_eq!(config.repertoire().unwrap().chars(), ['A']);
        assert!(!config.strips_hints());

        // MTX is ignored without EOT
        let config = PipelineConfig::new(&PipelineOptions {
            mtx: true,
            ..options(None)
        })
        .unwrap();
        assert_eq!(config.format(), OutputFormat::Sfnt);
    }

    #[test]
    fn conflicting_formats() {
        let err = PipelineConfig::new(&PipelineOptions {
            woff: true,
            eot: true,
            ..options(None)
        })
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::ConflictingFormats {
                first: "WOFF",
                second: "EOT"
            }
        );

        let err = PipelineConfig::new(&PipelineOptions {
            woff2: true,
            eot: true,
            mtx: true,
            ..options(None)
        })
        .unwrap_err();
        assert!(err.to_string().contains("WOFF2 and EOT (MTX)"), "{err}");
    }

    #[test]
    fn malformed_subset_string() {
        let err = PipelineConfig::new(&options(Some("AB"))).unwrap_err();
        assert!(
            matches!(err, ConfigError::MalformedEscape { position: 0, .. }),
            "{err}"
        );
    }

    #[test]
    fn zero_iterations() {
        let err = PipelineConfig::default().with_iterations(0).unwrap_err();
        assert_eq!(err, ConfigError::ZeroIterations);
        let config = PipelineConfig::default().with_iterations(3).unwrap();
        assert_eq!(config.iterations(), 3);
    }

    #[test]
    fn subsetting_to_sfnt() {
        let (report, output) = run(&options(Some("\\u41\\u42")));
        assert_eq!(report.iterations, 1);
        assert!(output.starts_with(&[0, 1, 0, 0]));

        let font = Font::new(&output).unwrap();
        assert_eq!(font.glyph_count().unwrap(), 3);
        for tag in RemovalSet::SUBSETTING.iter() {
            assert!(!font.has_table(tag), "{tag}");
        }
        // Hints are not stripped by default
        assert!(font.has_table(TableTag::FPGM));
        assert_valid_font(&output, ['A', 'B']);
    }

    #[test]
    fn stripping_hints_only() {
        let (_, output) = run(&PipelineOptions {
            strip_hints: true,
            ..options(None)
        });
        let input = test_font();
        let font = Font::new(&output).unwrap();
        assert_eq!(font.glyph_count().unwrap(), input.glyph_count().unwrap());
        let expected_tags: Vec<_> = input
            .table_tags()
            .filter(|&tag| !RemovalSet::HINT_STRIPPING.contains(tag))
            .collect();
        assert_eq!(font.table_tags().collect::<Vec<_>>(), expected_tags);
    }

    #[test]
    fn woff_output() {
        let (_, output) = run(&PipelineOptions {
            woff: true,
            ..options(Some("\\u43"))
        });
        assert!(output.starts_with(b"wOFF"));
        assert_valid_font(&output, ['C']);
    }

    #[test]
    fn woff2_output() {
        let (_, output) = run(&PipelineOptions {
            woff2: true,
            strip_hints: true,
            ..options(Some("\\u41\\u20"))
        });
        assert!(output.starts_with(b"wOF2"));
        assert_valid_font(&output, ['A', ' ']);
    }

    #[test]
    fn eot_output_with_mtx() {
        let (_, output) = run(&PipelineOptions {
            eot: true,
            mtx: true,
            ..options(Some("\\u41"))
        });
        let eot_size = u32::from_le_bytes(output[..4].try_into().unwrap());
        assert_eq!(eot_size as usize, output.len());
        assert_eq!(output[8..12], 0x_0002_0002_u32.to_le_bytes());
        let flags = u32::from_le_bytes(output[12..16].try_into().unwrap());
        assert_eq!(flags & 4, 4);
        assert_eq!(output[34..36], 0x_504c_u16.to_le_bytes());
    }

    #[test]
    fn mtx_without_eot_has_no_effect() {
        let (_, plain) = run(&options(Some("\\u41")));
        let (_, with_mtx) = run(&PipelineOptions {
            mtx: true,
            ..options(Some("\\u41"))
        });
        assert_eq!(plain, with_mtx);
    }

    #[test]
    fn runs_are_idempotent() {
        let options = PipelineOptions {
            strip_hints: true,
            woff: true,
            ..options(Some("\\u41\\u42\\u00C4"))
        };
        let (_, first) = run(&options);
        let (_, second) = run(&options);
        assert_eq!(first, second);
    }

    #[test]
    fn multiple_iterations_produce_same_output() {
        let (dir, input) = temp_font_dir();
        let output = dir.path().join("output.ttf");
        let config = PipelineConfig::new(&options(Some("\\u41\\uD83D\\uDE00")))
            .unwrap()
            .with_iterations(5)
            .unwrap();
        let report = Pipeline::new(config).run_files(&input, &output).unwrap();
        assert_eq!(report.iterations, 5);
        let repeated = fs::read(&output).unwrap();

        let (_, single) = run(&options(Some("\\u41\\uD83D\\uDE00")));
        assert_eq!(repeated, single);
    }

    #[test]
    fn transform_does_not_modify_font() {
        let font = test_font();
        let config = PipelineConfig::default()
            .with_repertoire(Repertoire::from("B"))
            .with_hint_stripping()
            .with_format(OutputFormat::Woff2);
        let pipeline = Pipeline::new(config);
        let output = pipeline.transform(&font).unwrap();
        assert_eq!(font, test_font());
        assert_eq!(pipeline.transform(&font).unwrap(), output);
    }

    #[test]
    fn transform_with_full_cmap() {
        let config = PipelineConfig::default()
            .with_repertoire(Repertoire::from("😀"))
            .with_cmap_ids(&[CmapId::WINDOWS_BMP, CmapId::WINDOWS_UCS4]);
        let output = Pipeline::new(config).transform(&test_font()).unwrap();
        let font = Font::new(&output).unwrap();
        let cmap = font.char_map().unwrap();
        assert_eq!(cmap.map_char('😀').unwrap(), 1);
        assert_eq!(font.glyph_count().unwrap(), 2);
    }

    #[test]
    fn uncovered_repertoire_aborts_run() {
        let (dir, input) = temp_font_dir();
        let output = dir.path().join("output.ttf");
        let config = PipelineConfig::new(&options(Some("\\u5A"))).unwrap();
        let err = Pipeline::new(config).run_files(&input, &output).unwrap_err();
        assert!(
            matches!(err, Error::InvalidRepertoire { char_count: 1 }),
            "{err}"
        );
        assert!(!output.exists());
    }

    #[test]
    fn missing_input_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("missing.ttf");
        let output = dir.path().join("output.ttf");
        let err = Pipeline::new(PipelineConfig::default())
            .run_files(&input, &output)
            .unwrap_err();
        let Error::Io { path, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(*path, input);
        assert!(!output.exists());
    }

    #[test]
    fn malformed_input_file() {
        let (dir, input) = temp_font_dir();
        fs::write(&input, b"not a font").unwrap();
        let output = dir.path().join("output.ttf");
        let err = Pipeline::new(PipelineConfig::default())
            .run_files(&input, &output)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFont(_)), "{err}");
    }

    #[test]
    fn large_sparse_repertoire_does_not_fit_into_bmp_cmap() {
        let (font, chars) = font_with_sparse_cjk_map();
        let repertoire: Repertoire = chars.iter().copied().collect();
        let config = PipelineConfig::default().with_repertoire(repertoire);
        let err = Pipeline::new(config).transform(&font).unwrap_err();

        let Error::UnsupportedFont(err) = &err else {
            panic!("unexpected error: {err}");
        };
        assert!(
            matches!(err.kind(), ParseErrorKind::DataTooLarge { max: 65_535, .. }),
            "{err}"
        );
        assert_eq!(err.table(), Some(TableTag::CMAP));
    }

    #[test]
    fn large_sparse_repertoire_with_full_cmap() {
        let (font, chars) = font_with_sparse_cjk_map();
        let config = PipelineConfig::default()
            .with_repertoire(chars.iter().copied().collect())
            .with_cmap_ids(&[CmapId::WINDOWS_UCS4]);
        let output = Pipeline::new(config).transform(&font).unwrap();

        let subset = Font::new(&output).unwrap();
        assert_eq!(subset.outlines().unwrap().glyph_count, 8);
        let cmap = subset.char_map().unwrap();
        assert!(matches!(cmap, CmapTable::Coverage(_)));
        for (i, &ch) in chars.iter().enumerate().step_by(997) {
            let expected = u16::try_from(i % 7 + 1).unwrap();
            assert_eq!(cmap.map_char(ch).unwrap(), expected, "{ch:?}");
        }
    }
}
