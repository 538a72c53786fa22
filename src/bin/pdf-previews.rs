//! PDF Previews CLI tool
//!
//! Turns PDF and Word documents into watermarked, rasterized preview PDFs.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use glob::glob;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdf_previews::convert::{DocumentConverter, SofficeConverter};
use pdf_previews::merge::MergeOrder;
use pdf_previews::pdf::{PdfiumRenderer, SourceDocument};
use pdf_previews::selection::{parse_directives, Directive, PageSelection};
use pdf_previews::session::PreviewSession;
use pdf_previews::settings::PreviewSettings;
use pdf_previews::watermark::StampFont;

/// PDF Previews - Watermarked preview PDFs for teaching materials
#[derive(Parser)]
#[command(name = "pdf-previews")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Preview the first three pages of every PDF in the folder
    pdf-previews preview -o previews --first 3 *.pdf

    # Pick pages and change the stamp
    pdf-previews preview -o out --pages \"1-3, 6, 9-10\" --text \"Sample\" --opacity 0.35 unit.pdf

    # Use a settings file, merge by original file size, skip the ZIP
    pdf-previews preview -o out --config previews.yaml --merge-order size --no-zip *.pdf *.docx

    # Check what a page range resolves to
    pdf-previews select unit.pdf \"1-3, 12-9, abc\"")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate watermarked previews
    Preview {
        /// Input PDF or DOCX files. Supports glob patterns like "*.pdf"
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Directory to write previews into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Pages to keep, e.g. "1-3, 6, 9-10"
        #[arg(long)]
        pages: Option<String>,

        /// Keep the first N pages
        #[arg(long)]
        first: Option<u32>,

        /// Keep every page (the default when no selection is given)
        #[arg(long)]
        all: bool,

        /// Watermark text
        #[arg(long)]
        text: Option<String>,

        /// Watermark opacity, 0-1
        #[arg(long)]
        opacity: Option<f32>,

        /// Watermark angle in degrees, -180 to 180
        #[arg(long, allow_hyphen_values = true)]
        angle: Option<f32>,

        /// Watermark font size in pixels
        #[arg(long)]
        font_size: Option<u32>,

        /// Tiling density, 0-1
        #[arg(long)]
        coverage: Option<f32>,

        /// Render resolution
        #[arg(long)]
        dpi: Option<u32>,

        /// JPEG quality of the preview pages, 1-100
        #[arg(long)]
        quality: Option<u8>,

        /// Suffix appended to each output file name
        #[arg(long, allow_hyphen_values = true)]
        suffix: Option<String>,

        /// TrueType/OpenType font for the stamp text
        #[arg(long)]
        font: Option<PathBuf>,

        /// YAML settings file; flags override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Build merged_previews.pdf from every output
        #[arg(long, overrides_with = "no_merge")]
        merge: bool,

        /// Do not build a merged document
        #[arg(long, overrides_with = "merge")]
        no_merge: bool,

        /// Bundle every preview into previews.zip
        #[arg(long, overrides_with = "no_zip")]
        zip: bool,

        /// Do not build a ZIP bundle
        #[arg(long, overrides_with = "zip")]
        no_zip: bool,

        /// Order of documents in the merged output: name or size
        #[arg(long, value_parser = parse_merge_order)]
        merge_order: Option<MergeOrder>,

        /// Rasterize documents even when nothing is selected
        #[arg(long)]
        include_empty: bool,

        /// Open the result after creation
        #[arg(long)]
        open: bool,
    },

    /// Show which pages a selection resolves to
    Select {
        /// PDF file
        input: PathBuf,

        /// Selection text, e.g. "1-3, 6"
        ranges: String,
    },

    /// Show information about a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },
}

/// Command-line overrides for the preview settings
struct PreviewOverrides {
    text: Option<String>,
    opacity: Option<f32>,
    angle: Option<f32>,
    font_size: Option<u32>,
    coverage: Option<f32>,
    dpi: Option<u32>,
    quality: Option<u8>,
    suffix: Option<String>,
    merge: Option<bool>,
    merge_order: Option<MergeOrder>,
    zip: Option<bool>,
    include_empty: bool,
}

impl PreviewOverrides {
    fn apply(self, settings: &mut PreviewSettings) {
        if let Some(text) = self.text {
            settings.watermark.text = text;
        }
        if let Some(opacity) = self.opacity {
            settings.watermark.opacity = opacity;
        }
        if let Some(angle) = self.angle {
            settings.watermark.angle_degrees = angle;
        }
        if let Some(font_size) = self.font_size {
            settings.watermark.font_size = font_size;
        }
        if let Some(coverage) = self.coverage {
            settings.watermark.coverage = coverage;
        }
        if let Some(dpi) = self.dpi {
            settings.dpi = dpi;
        }
        if let Some(quality) = self.quality {
            settings.jpeg_quality = quality;
        }
        if let Some(suffix) = self.suffix {
            settings.output_suffix = suffix;
        }
        if let Some(merge) = self.merge {
            settings.merge = merge;
        }
        if let Some(order) = self.merge_order {
            settings.merge_order = order;
        }
        if let Some(zip) = self.zip {
            settings.zip = zip;
        }
        if self.include_empty {
            settings.skip_empty = false;
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_previews=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Preview {
            inputs,
            output,
            pages,
            first,
            all,
            text,
            opacity,
            angle,
            font_size,
            coverage,
            dpi,
            quality,
            suffix,
            font,
            config,
            merge,
            no_merge,
            zip,
            no_zip,
            merge_order,
            include_empty,
            open,
        } => {
            let overrides = PreviewOverrides {
                text,
                opacity,
                angle,
                font_size,
                coverage,
                dpi,
                quality,
                suffix,
                merge: flag_pair(merge, no_merge),
                merge_order,
                zip: flag_pair(zip, no_zip),
                include_empty,
            };
            let directives = selection_directives(pages.as_deref(), first, all);
            cmd_preview(inputs, output, directives, overrides, font, config, open)
        }
        Commands::Select { input, ranges } => cmd_select(input, &ranges),
        Commands::Info { input } => cmd_info(input),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// `--x` / `--no-x` to an optional override
fn flag_pair(on: bool, off: bool) -> Option<bool> {
    if off {
        Some(false)
    } else if on {
        Some(true)
    } else {
        None
    }
}

fn parse_merge_order(value: &str) -> Result<MergeOrder, String> {
    value.parse().map_err(|e: pdf_previews::Error| e.to_string())
}

/// Turn the selection flags into directives; no flags selects every page
fn selection_directives(pages: Option<&str>, first: Option<u32>, all: bool) -> Vec<Directive> {
    let mut directives = Vec::new();
    if all {
        directives.push(Directive::All);
    }
    if let Some(n) = first {
        directives.push(Directive::FirstN(n));
    }
    if let Some(text) = pages {
        directives.extend(parse_directives(text));
    }
    if directives.is_empty() && pages.is_none() {
        directives.push(Directive::All);
    }
    directives
}

/// Expand glob patterns in input paths
fn expand_globs(patterns: Vec<String>) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for pattern in patterns {
        // Check if pattern contains glob characters
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let mut matched = false;
            let entries =
                glob(&pattern).map_err(|_| pdf_previews::Error::InvalidGlob(pattern.clone()))?;
            for entry in entries {
                match entry {
                    Ok(path) => {
                        paths.push(path);
                        matched = true;
                    }
                    Err(e) => tracing::warn!(%pattern, error = %e, "glob error"),
                }
            }
            if !matched {
                return Err(pdf_previews::Error::NoFilesMatched(pattern).into());
            }
        } else {
            paths.push(PathBuf::from(pattern));
        }
    }

    // Sort paths for consistent ordering
    paths.sort();

    Ok(paths)
}

/// Open a file with the system default application
fn open_file(path: &Path) -> anyhow::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(path).spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(path).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}

/// Generate previews for every input
fn cmd_preview(
    inputs: Vec<String>,
    output: PathBuf,
    directives: Vec<Directive>,
    overrides: PreviewOverrides,
    font: Option<PathBuf>,
    config: Option<PathBuf>,
    open: bool,
) -> anyhow::Result<()> {
    let inputs = expand_globs(inputs)?;

    let mut settings = match &config {
        Some(path) => PreviewSettings::from_file(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => PreviewSettings::default(),
    };
    overrides.apply(&mut settings);
    settings.validate()?;

    let font = match &font {
        Some(path) => StampFont::from_file(path)?,
        None => StampFont::embedded(),
    };

    let converter: &dyn DocumentConverter = &SofficeConverter::new();
    let mut session = PreviewSession::new();
    for path in &inputs {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        match session.add_upload(&name, bytes, Some(converter)) {
            Ok(key) => {
                if let Some(entry) = session.entry_mut(&key) {
                    for directive in &directives {
                        entry.selection_mut().apply(directive);
                    }
                }
            }
            Err(e) => eprintln!("Skipping {}", e),
        }
    }

    if session.is_empty() {
        bail!("No readable documents");
    }

    eprintln!("Generating previews for {} documents...", session.len());

    let renderer = PdfiumRenderer::new()?;
    let report = session.generate(&renderer, &settings, &font)?;

    for name in &report.skipped {
        eprintln!("Skipped (no pages): {}", name);
    }
    for failure in &report.failures {
        eprintln!("Warning: {}", failure);
    }

    if report.is_empty() {
        bail!("No previews generated. Check your selections.");
    }

    let written = report.write_all(&output)?;
    for path in &written {
        eprintln!("Wrote: {}", path.display());
    }

    if open {
        // Merged document if there is one, else the last preview
        let last_pdf = written
            .iter()
            .rev()
            .find(|path| path.extension().is_some_and(|ext| ext == "pdf"));
        if let Some(path) = last_pdf {
            open_file(path)?;
        }
    }

    Ok(())
}

/// Print the pages a selection resolves to
fn cmd_select(input: PathBuf, ranges: &str) -> anyhow::Result<()> {
    let document = SourceDocument::load(&input)?;
    let selection = PageSelection::from_text(document.page_count(), ranges);

    let pages: Vec<String> = selection.iter().map(|p| p.to_string()).collect();
    println!("File: {}", input.display());
    println!(
        "Selected: {} of {} pages",
        selection.len(),
        document.page_count()
    );
    println!("Pages: {}", pages.join(", "));

    Ok(())
}

/// Show information about a PDF file
fn cmd_info(input: PathBuf) -> anyhow::Result<()> {
    let document = SourceDocument::load(&input)?;

    println!("File: {}", input.display());
    println!("Pages: {}", document.page_count());
    if let Some(title) = document.title() {
        println!("Title: {}", title);
    }
    if let Some(author) = document.author() {
        println!("Author: {}", author);
    }

    for (index, page) in document.pages().iter().enumerate() {
        println!(
            "  Page {}: {:.0} x {:.0} pt ({:.2} x {:.2} in)",
            index + 1,
            page.width.pt(),
            page.height.pt(),
            page.width.inches(),
            page.height.inches(),
        );
    }

    Ok(())
}
