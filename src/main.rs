use clap::Parser;
use img2spline::{output, Color, Diagnostic, FittingOptions, Format, TraceContext};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "img2spline", about = "Trace a raster image into vector outlines")]
struct Cli {
    /// Input image path (PNG, JPEG, BMP, GIF, ...)
    #[arg(short, long)]
    input: PathBuf,

    /// Output path; the format is taken from its extension unless --format is given
    #[arg(short, long)]
    output: PathBuf,

    /// Output format (svg, eps, ps, pdf, emf, dxf, plt, cgm, fig, ild)
    #[arg(short, long)]
    format: Option<Format>,

    /// Load tracing options from a JSON preset; flags below override it
    #[arg(long)]
    options: Option<PathBuf>,

    /// Number of colours to trace (0 = monochrome)
    #[arg(long)]
    colors: Option<u32>,

    /// Trace centre-lines instead of filled outlines
    #[arg(long)]
    centerline: bool,

    /// Record stroke widths in centre-line mode
    #[arg(long)]
    preserve_width: bool,

    /// Exact colour (rrggbb) treated as transparent background
    #[arg(long)]
    background_color: Option<Color>,

    /// Remove specks of up to 2^(level-1) pixels (0-20)
    #[arg(long)]
    despeckle_level: Option<u32>,

    /// Colour weight when merging specks (0.0-8.0)
    #[arg(long)]
    despeckle_tightness: Option<f64>,

    /// Minimum turn (degrees) for a corner
    #[arg(long)]
    corner_threshold: Option<f64>,

    /// Outline pixels each side used to measure a corner
    #[arg(long)]
    corner_surround: Option<usize>,

    /// Maximum fitting error in pixels before a curve is split
    #[arg(long)]
    error_threshold: Option<f64>,

    /// Maximum deviation in pixels for a straight line
    #[arg(long)]
    line_threshold: Option<f64>,

    /// Smoothing passes before fitting
    #[arg(long)]
    filter_iterations: Option<usize>,

    /// Keep only the sharpest of nearby corners
    #[arg(long)]
    remove_adjacent_corners: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn fitting_options(&self) -> Result<FittingOptions, Box<dyn std::error::Error>> {
        let mut options = match &self.options {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => FittingOptions::default(),
        };
        if let Some(v) = self.colors {
            options.color_count = v;
        }
        if let Some(v) = self.background_color {
            options.background_color = Some(v);
        }
        if let Some(v) = self.despeckle_level {
            options.despeckle_level = v;
        }
        if let Some(v) = self.despeckle_tightness {
            options.despeckle_tightness = v;
        }
        if let Some(v) = self.corner_threshold {
            options.corner_threshold = v;
        }
        if let Some(v) = self.corner_surround {
            options.corner_surround = v;
        }
        if let Some(v) = self.error_threshold {
            options.error_threshold = v;
        }
        if let Some(v) = self.line_threshold {
            options.line_threshold = v;
        }
        if let Some(v) = self.filter_iterations {
            options.filter_iterations = v;
        }
        options.centerline |= self.centerline;
        options.preserve_width |= self.preserve_width;
        options.remove_adjacent_corners |= self.remove_adjacent_corners;
        Ok(options)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let options = cli.fitting_options()?;
    let format = match cli.format {
        Some(f) => f,
        None => Format::from_path(&cli.output)?,
    };

    let mut ctx = TraceContext::new();
    let doc = img2spline::trace_file(&cli.input, &options, &mut ctx)?;

    let mut out = std::io::BufWriter::new(std::fs::File::create(&cli.output)?);
    output::write_document(&doc, format, &mut out, &mut ctx.diagnostics)?;

    let diagnostics = &ctx.diagnostics;
    let non_converged =
        diagnostics.count_where(|d| matches!(d, Diagnostic::FittingNonConvergence { .. }));
    let degenerate = diagnostics.count_where(|d| matches!(d, Diagnostic::DegenerateGeometry { .. }));
    if non_converged > 0 {
        log::warn!("{} fit(s) stopped at the subdivision limit", non_converged);
    }
    if degenerate > 0 {
        log::warn!("{} degenerate feature(s) skipped", degenerate);
    }

    let (lines, cubics) = doc.segment_counts();
    eprintln!(
        "  \u{2713} {}  ({} outlines \u{00b7} {} cubics + {} lines)",
        cli.output.display(),
        doc.outline_count(),
        cubics,
        lines
    );
    Ok(())
}
