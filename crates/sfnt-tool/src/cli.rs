//! Command-line args.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{ArgAction, Parser};
use sfnt_subset::{Pipeline, PipelineConfig, PipelineOptions};

/// Subsets TrueType fonts, strips hints and converts them to web font formats.
///
/// Examples:
///   sfnttool -s '\u41\u42' font.ttf subset.ttf  # Subset to 'A' and 'B'
///   sfnttool -h -w font.ttf font.woff           # Strip hints and convert to WOFF
///   sfnttool -e -x font.ttf font.eot            # Convert to EOT with MTX compression
#[derive(Debug, Parser)]
#[command(name = "sfnttool", version, disable_help_flag = true, verbatim_doc_comment)]
pub(crate) struct Cli {
    /// Print help.
    #[arg(short = '?', long, action = ArgAction::Help)]
    help: Option<bool>,

    /// Chars to subset the font to, as a sequence of `\uXXXX` escapes (e.g., `\u41\u42`).
    /// Escaped UTF-16 surrogate pairs are combined into a single char.
    #[arg(short = 's', long = "string", value_name = "ESCAPED")]
    subset_string: Option<String>,

    /// Strip TrueType hinting instructions.
    #[arg(short = 'h', long)]
    hints: bool,

    /// Output WOFF 1.0.
    #[arg(short = 'w', long)]
    woff: bool,

    /// Output WOFF2.
    #[arg(short = '2', long)]
    woff2: bool,

    /// Output Embedded OpenType (EOT).
    #[arg(short = 'e', long)]
    eot: bool,

    /// Wrap EOT font data in a MicroType Express container. Ignored for other formats.
    /// Blocks are zlib-compressed rather than LZCOMP-compressed, so MTX-aware consumers
    /// cannot decode the output.
    #[arg(short = 'x', long)]
    mtx: bool,

    /// Benchmark mode: run the pipeline 10000 times.
    #[arg(short = 'b', long)]
    bench: bool,

    /// Input font file (OpenType or TrueType collection; the first font is used).
    #[arg(value_name = "FONT")]
    font: PathBuf,

    /// Output file. Overwritten if exists.
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,
}

impl Cli {
    fn options(&self) -> PipelineOptions {
        PipelineOptions {
            subset_string: self.subset_string.clone(),
            strip_hints: self.hints,
            woff: self.woff,
            woff2: self.woff2,
            eot: self.eot,
            mtx: self.mtx,
            bench: self.bench,
        }
    }

    pub(crate) fn run(self) -> anyhow::Result<()> {
        let config = PipelineConfig::new(&self.options()).context("invalid options")?;
        let report = Pipeline::new(config)
            .run_files(&self.font, &self.output)
            .with_context(|| format!("failed processing font `{}`", self.font.display()))?;

        if self.bench {
            let iterations = u32::try_from(report.iterations).unwrap_or(u32::MAX);
            let per_iteration = report.elapsed / iterations;
            println!(
                "{} iterations in {:?} ({per_iteration:?} per iteration)",
                report.iterations, report.elapsed
            );
        }
        Ok(())
    }
}
