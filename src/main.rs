//! Main entry point for the runzip CLI application.
//!
//! This binary provides a command-line interface for listing, testing and
//! extracting ZIP files from both local filesystem and remote HTTP URLs.

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, error, warn};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use runzip::{Cli, EntryCatalog, EntryRecord, HttpRangeReader, LocalFileReader, ReadAt, ZipExtractor};

#[cfg(test)]
#[path = "zip/test_support.rs"]
mod test_support;

/// Application entry point.
///
/// Parses command-line arguments and dispatches to the appropriate handler
/// based on whether the input is a local file or HTTP URL.
fn main() -> Result<()> {
    let cli = Cli::parse();

    simple_logger::init_with_level(cli.log_level()).context("Failed to initialize logger")?;
    debug!("Log level: {}", cli.log_level());

    if cli.is_http_url() {
        // Handle remote ZIP file via HTTP Range requests
        let reader = Arc::new(HttpRangeReader::new(cli.file.clone())?);
        let transferred_before = reader.transferred_bytes();

        process_zip(reader.clone(), &cli)?;

        // Display network transfer statistics for HTTP sources
        if !cli.is_quiet() {
            let transferred = reader.transferred_bytes() - transferred_before;
            eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
        }
    } else {
        let reader = LocalFileReader::new(Path::new(&cli.file))
            .with_context(|| format!("Cannot open {}", cli.file))?;
        process_zip(Arc::new(reader), &cli)?;
    }

    Ok(())
}

/// Process a ZIP archive based on CLI options.
///
/// - List mode (`-l` or `-v`): Display archive contents
/// - Test mode (`-t`): Decompress every selected entry and check it
/// - Extract mode: Extract files matching the specified filters
fn process_zip<R: ReadAt>(reader: Arc<R>, cli: &Cli) -> Result<()> {
    let catalog = EntryCatalog::from_reader_named(reader, cli.file.clone())?
        .with_options(cli.stream_options());
    let mut extractor = ZipExtractor::new(catalog);

    // List mode: display archive contents and exit
    if cli.list || cli.verbose {
        list_files(&extractor, cli.verbose);
        return Ok(());
    }

    let selected: Vec<EntryRecord> = extractor
        .list_files()
        .iter()
        .filter(|e| is_selected(e, cli))
        .cloned()
        .collect();

    if cli.test {
        return test_files(&mut extractor, &selected, cli);
    }

    // Extract each matching file
    let multiple_files = cli.pipe && selected.len() > 1;
    for entry in &selected {
        extract_file(&mut extractor, entry, cli, multiple_files)?;
    }

    Ok(())
}

/// Apply filters to determine which entries to process:
/// 1. Skip directories (they are created automatically during extraction)
/// 2. If specific files are requested, only include matching entries
/// 3. Exclude files matching the exclusion patterns
fn is_selected(entry: &EntryRecord, cli: &Cli) -> bool {
    if entry.is_directory() {
        return false;
    }

    if !cli.files.is_empty() {
        let matches = cli.files.iter().any(|f| {
            if has_glob_chars(f) {
                glob_match(f, entry.name())
            } else {
                // No wildcards: exact match on filename or full path
                let basename = Path::new(entry.name())
                    .file_name()
                    .map(|s| s.to_string_lossy())
                    .unwrap_or_default();
                entry.name() == f || basename == *f
            }
        });
        if !matches {
            return false;
        }
    }

    !cli
        .exclude
        .iter()
        .any(|x| entry.name().contains(x.as_str()) || glob_match(x, entry.name()))
}

/// List files in the ZIP archive.
///
/// Supports two output formats:
/// - Simple format (`-l`): Just file names, one per line
/// - Verbose format (`-v`): Detailed table with size, compression ratio, CRC and timestamps
fn list_files<R: ReadAt>(extractor: &ZipExtractor<R>, verbose: bool) {
    let entries = extractor.list_files();

    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  {:>8}  Name",
            "Length", "Size", "Cmpr", "Date", "Time", "CRC-32"
        );
        println!("{}", "-".repeat(80));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in entries {
        if !verbose {
            println!("{}", entry.name());
            continue;
        }

        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();

        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {:08x}  {}",
            entry.uncompressed_size(),
            entry.compressed_size(),
            ratio(entry.compressed_size(), entry.uncompressed_size()),
            year,
            month,
            day,
            hour,
            minute,
            entry.crc32(),
            entry.name()
        );

        if !entry.is_directory() {
            total_uncompressed += entry.uncompressed_size();
            total_compressed += entry.compressed_size();
            file_count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(80));
        println!(
            "{:>10}  {:>10}  {}  {:>31}  {} files",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
        let comment = extractor.catalog().comment();
        if !comment.is_empty() {
            println!("{}", comment);
        }
    }
}

/// Compression ratio as percentage saved
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// Decompress every selected entry, reporting size and CRC failures.
fn test_files<R: ReadAt>(
    extractor: &mut ZipExtractor<R>,
    entries: &[EntryRecord],
    cli: &Cli,
) -> Result<()> {
    let mut failures = 0usize;

    for entry in entries {
        match extractor.test_entry(entry) {
            Ok(_) => {
                if !cli.is_quiet() {
                    println!("    testing: {:<40} OK", entry.name());
                }
            }
            Err(e) => {
                failures += 1;
                error!("{}", e);
                println!("    testing: {:<40} FAILED", entry.name());
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} entries failed", failures, entries.len());
    }
    if !cli.is_very_quiet() {
        println!("No errors detected in {}", cli.file);
    }
    Ok(())
}

/// Extract a single file from the archive.
///
/// Handles various extraction options:
/// - Pipe mode (`-p`): Write to stdout instead of file
/// - Custom output directory (`-d`): Extract to specified directory
/// - Junk paths (`-j`): Ignore directory structure in archive
/// - Overwrite control (`-n`, `-o`): Handle existing files
fn extract_file<R: ReadAt>(
    extractor: &mut ZipExtractor<R>,
    entry: &EntryRecord,
    cli: &Cli,
    show_filename: bool,
) -> Result<()> {
    // Pipe mode: write file contents directly to stdout
    if cli.pipe {
        if show_filename {
            println!("--- {} ---", entry.name());
        }
        extractor
            .extract_to_stdout(entry)
            .with_context(|| format!("Failed to extract {}", entry.name()))?;
        return Ok(());
    }

    let file_name = if cli.junk_paths {
        // Junk paths: use only the base filename, ignore directory structure
        Path::new(entry.name())
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| entry.name().to_string())
    } else {
        entry.name().to_string()
    };
    if !is_contained_path(&file_name) {
        warn!("Skipping {}: path escapes the extraction directory", entry.name());
        return Ok(());
    }
    let output_path = match cli.extract_dir {
        Some(ref dir) => PathBuf::from(dir).join(&file_name),
        None => PathBuf::from(&file_name),
    };

    if output_path.exists() {
        if cli.never_overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", entry.name());
            }
            return Ok(());
        }

        if !cli.overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", entry.name());
            }
            return Ok(());
        }
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", entry.name());
    }

    extractor
        .extract_to_file(entry, &output_path)
        .with_context(|| format!("Failed to extract {}", entry.name()))?;

    Ok(())
}

/// True when `name` stays below the directory it is joined to: no `..`,
/// no root and no drive prefix.
fn is_contained_path(name: &str) -> bool {
    let mut named = false;
    for component in Path::new(name).components() {
        match component {
            Component::Normal(_) => named = true,
            Component::CurDir => {}
            _ => return false,
        }
    }
    named
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_wildcards() {
        assert!(glob_match("*.txt", "readme.txt"));
        assert!(glob_match("file?.dat", "file1.dat"));
        assert!(!glob_match("*.txt", "readme.md"));
        assert!(glob_match("docs/*", "docs/a/b.md"));
    }

    #[test]
    fn escaping_names_are_refused() {
        assert!(is_contained_path("a.txt"));
        assert!(is_contained_path("nested/dir/file.txt"));
        assert!(is_contained_path("./here.txt"));

        assert!(!is_contained_path("../x"));
        assert!(!is_contained_path("a/../../x"));
        assert!(!is_contained_path("/etc/x"));
        assert!(!is_contained_path(".."));
        assert!(!is_contained_path(""));
    }

    #[test]
    fn extraction_skips_escaping_entries() {
        let root = std::env::temp_dir().join(format!("runzip-contained-{}", std::process::id()));
        let dir = root.join("out");
        std::fs::create_dir_all(&dir).unwrap();

        let data = crate::test_support::ZipBuilder::new()
            .stored("../escaped.txt", b"outside")
            .stored("inside.txt", b"inside")
            .finish();
        let catalog = EntryCatalog::from_reader(Arc::new(runzip::MemoryReader::new(data))).unwrap();
        let mut extractor = ZipExtractor::new(catalog);
        let entries = extractor.list_files().to_vec();
        let dir_arg = dir.to_string_lossy().into_owned();
        let cli = Cli::parse_from(["runzip", "-q", "-d", dir_arg.as_str(), "a.zip"]);

        for entry in &entries {
            extract_file(&mut extractor, entry, &cli, false).unwrap();
        }
        assert!(!root.join("escaped.txt").exists());
        assert_eq!(std::fs::read(dir.join("inside.txt")).unwrap(), b"inside");

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn sizes_and_ratios() {
        assert_eq!(format_size(500), "500 bytes");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
        assert_eq!(ratio(25, 100), "  75%");
        assert_eq!(ratio(0, 0), "  0%");
        assert_eq!(ratio(120, 100), "  0%");
    }
}
