use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::Config;
use crate::png_text::{PngImage, TextMetadata, write_png};
use crate::report::Reporter;
use crate::transliterate::Transliterator;

/// The only text property that is read, cleaned and written back.
pub const PARAMETERS_KEY: &str = "parameters";

/// Batch mode picks up files whose name ends with this (case-sensitive).
pub const BATCH_SUFFIX: &str = ".png";

/// Bad input/output paths, detected before any image is touched.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("{} does not exist", .0.display())]
    Missing(PathBuf),
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
}

/// The result of cleaning a single image.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Whether the source carried a `parameters` entry.
    pub parameters_found: bool,
    /// Characters that were escaped rather than transliterated.
    pub unusual_characters: usize,
    /// Text entries on the source other than `parameters` (not carried over).
    pub dropped_entries: usize,
    /// Set only in keep-going batch mode, when this file failed.
    pub error: Option<String>,
}

impl ProcessResult {
    fn new(source: &Path, destination: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            parameters_found: false,
            unusual_characters: 0,
            dropped_entries: 0,
            error: None,
        }
    }
}

/// Settings for [`run_batch`].
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub debug: bool,
    /// Abort on the first failing file instead of recording it and continuing.
    pub fail_fast: bool,
    pub progress_interval: usize,
    /// When non-empty, these files are cleaned in place instead of walking the input directory.
    pub override_paths: Vec<PathBuf>,
}

impl BatchOptions {
    pub fn from_config(config: &Config, debug: bool) -> Self {
        Self {
            debug,
            fail_fast: config.batch.fail_fast,
            progress_interval: config.batch.progress_interval,
            override_paths: config.override_paths.clone(),
        }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from_config(&Config::default(), false)
    }
}

/// Per-file results of a batch run, in processing order.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub results: Vec<ProcessResult>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_none()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_some()).count()
    }
}

/// Clean the `parameters` text of one PNG and write the result.
///
/// 1. **Read** — validate `source` as a PNG and collect its text chunks
/// 2. **Clean** — transliterate `parameters`, if present, reporting every escaped character
/// 3. **Write** — save to `destination` with `parameters` as the only text entry
///
/// `source` and `destination` may be the same path.
///
/// # Example
///
/// ```rust,no_run
/// use png_param_cleaner::pipeline::clean_image;
/// use png_param_cleaner::report::ConsoleReporter;
/// use png_param_cleaner::transliterate::Transliterator;
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// let mut reporter = ConsoleReporter::stdout();
/// let result = clean_image(
///     Path::new("in.png"),
///     Path::new("out.png"),
///     false,
///     &Transliterator::default(),
///     &mut reporter,
/// )?;
/// println!("parameters found: {}", result.parameters_found);
/// # Ok(())
/// # }
/// ```
pub fn clean_image(
    source: &Path,
    destination: &Path,
    debug: bool,
    transliterator: &Transliterator,
    reporter: &mut dyn Reporter,
) -> Result<ProcessResult> {
    let image = PngImage::open(source)?;
    let source_metadata = image.text_metadata();

    if debug {
        let (width, height) = image.dimensions();
        println!("{} ({width}x{height})", source.display());
        print!("{}", image.chunk_summary());
        print!("{source_metadata}");
    }

    let mut result = ProcessResult::new(source, destination);
    let mut output = TextMetadata::default();

    if let Some(parameters) = source_metadata.get(PARAMETERS_KEY) {
        let cleaned = transliterator.clean(parameters);
        for &ch in &cleaned.unusual {
            reporter.unusual_character(ch, source);
        }
        result.parameters_found = true;
        result.unusual_characters = cleaned.unusual.len();
        output.insert(PARAMETERS_KEY, cleaned.text);
    }

    result.dropped_entries = source_metadata
        .entries()
        .iter()
        .filter(|e| e.keyword != PARAMETERS_KEY)
        .count();

    if debug {
        println!();
        print!("{output}");
    }

    write_png(image, &output, destination)?;
    log::debug!(
        "Cleaned {} -> {} ({} unusual, {} dropped)",
        source.display(),
        destination.display(),
        result.unusual_characters,
        result.dropped_entries
    );

    Ok(result)
}

/// List the files directly inside `dir` whose name ends with [`BATCH_SUFFIX`],
/// sorted by file name.
///
/// Symlinks count when they point at a regular file. Entries that cannot be
/// inspected are skipped with a warning unless their name matches; a matching
/// one is still listed so the batch failure policy decides what happens to it.
pub fn collect_pngs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(e).with_context(|| format!("Failed to list {}", dir.display()));
            }
            Err(e) => {
                match e.path() {
                    Some(path) if has_batch_suffix(path) => images.push(path.to_path_buf()),
                    _ => log::warn!("Skipping unreadable entry in {}: {e}", dir.display()),
                }
                continue;
            }
        };

        if !has_batch_suffix(entry.path()) {
            continue;
        }
        let is_file = if entry.path_is_symlink() {
            match std::fs::metadata(entry.path()) {
                Ok(meta) => meta.is_file(),
                Err(e) => {
                    log::warn!("Cannot resolve {}: {e}", entry.path().display());
                    true
                }
            }
        } else {
            entry.file_type().is_file()
        };
        if is_file {
            images.push(entry.into_path());
        }
    }

    Ok(images)
}

fn has_batch_suffix(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().ends_with(BATCH_SUFFIX))
}

/// Clean every matching image of `input_dir` into `output_dir`.
///
/// With a non-empty override list, the directories are ignored and each
/// listed file is rewritten in place instead. Progress is reported after
/// every `progress_interval` files.
pub fn run_batch(
    input_dir: &Path,
    output_dir: &Path,
    options: &BatchOptions,
    transliterator: &Transliterator,
    reporter: &mut dyn Reporter,
) -> Result<BatchReport> {
    let jobs: Vec<(PathBuf, PathBuf)> = if options.override_paths.is_empty() {
        prepare_directories(input_dir, output_dir)?;
        collect_pngs(input_dir)?
            .into_iter()
            .map(|source| {
                let destination = output_dir.join(source.file_name().unwrap_or_default());
                (source, destination)
            })
            .collect()
    } else {
        log::info!(
            "Override list set: rewriting {} file(s) in place",
            options.override_paths.len()
        );
        options
            .override_paths
            .iter()
            .map(|p| (p.clone(), p.clone()))
            .collect()
    };

    log::info!("Found {} image(s) to process", jobs.len());

    let interval = options.progress_interval.max(1);
    let total = jobs.len();
    let mut report = BatchReport::default();

    for (index, (source, destination)) in jobs.into_iter().enumerate() {
        let processed = index + 1;
        log::debug!("[{processed}/{total}] Processing: {}", source.display());

        let cleaned = clean_image(&source, &destination, options.debug, transliterator, reporter);
        let result = match cleaned {
            Ok(result) => result,
            Err(e) if !options.fail_fast => {
                log::error!("  Error: {}: {e:#}", source.display());
                let mut failed = ProcessResult::new(&source, &destination);
                failed.error = Some(format!("{e:#}"));
                failed
            }
            Err(e) => return Err(e.context(format!("Failed to clean {}", source.display()))),
        };
        report.results.push(result);

        if processed % interval == 0 {
            reporter.progress(processed);
        }
    }

    Ok(report)
}

fn prepare_directories(input_dir: &Path, output_dir: &Path) -> Result<()> {
    if !input_dir.exists() {
        return Err(InputError::Missing(input_dir.to_path_buf()).into());
    }
    if !input_dir.is_dir() {
        return Err(InputError::NotADirectory(input_dir.to_path_buf()).into());
    }
    if output_dir.exists() && !output_dir.is_dir() {
        return Err(InputError::NotADirectory(output_dir.to_path_buf()).into());
    }

    if !output_dir.exists() {
        std::fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create output directory {}", output_dir.display())
        })?;
        log::debug!("Created {}", output_dir.display());
    }

    Ok(())
}
