use crate::billing::{PricingProvider, UsageEntry};
use crate::error::{Result, UsageError};
use crate::utils::transcript::{extract_session_id, parse_line, ParsedLine, TranscriptError};
use ignore::WalkBuilder;
use memchr::memchr_iter;
use memmap2::Mmap;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Files up to this size are read into memory, larger ones are mapped
const MMAP_THRESHOLD: u64 = 64 * 1024;

/// Loads usage entries from JSONL transcripts
#[derive(Debug, Clone, Default)]
pub struct DataLoader {
    pricing: PricingProvider,
    threads: Option<usize>,
}

/// Buffer type for file reading
enum FileBuf {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl FileBuf {
    fn as_bytes(&self) -> &[u8] {
        match self {
            FileBuf::Owned(v) => v,
            FileBuf::Mapped(m) => m,
        }
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Parsed lines of one file, in line order
struct FileParse {
    lines: Vec<ParsedLine>,
    skipped: usize,
}

impl DataLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Price entries that carry no recorded cost with `pricing`
    pub fn with_pricing(mut self, pricing: PricingProvider) -> Self {
        self.pricing = pricing;
        self
    }

    /// Fix the size of the parsing thread pool
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads.max(1));
        self
    }

    pub fn pricing(&self) -> &PricingProvider {
        &self.pricing
    }

    /// Load a single JSONL file, keeping file order
    pub fn load_from_file(&self, path: impl AsRef<Path>) -> Result<Vec<UsageEntry>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| UsageError::io(path, e))?;
        let session_id = extract_session_id(path);

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut skipped = 0usize;

        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| UsageError::io(path, e))?;
            if read == 0 {
                break;
            }
            // Raw bytes; invalid UTF-8 is rejected by the parser like any other bad line
            match parse_line(trim_line_end(&line), &session_id, &self.pricing) {
                Ok(parsed) => {
                    if Self::is_new(&mut seen, &parsed) {
                        entries.push(parsed.entry);
                    }
                }
                Err(TranscriptError::Blank) => {}
                Err(_) => skipped += 1,
            }
        }

        debug!(
            "Loaded {} entries from {} ({} lines skipped)",
            entries.len(),
            path.display(),
            skipped
        );

        Ok(entries)
    }

    /// Load every `*.jsonl` below `dir`, sorted by timestamp
    pub fn load_from_directory(&self, dir: impl AsRef<Path>) -> Result<Vec<UsageEntry>> {
        self.load_from_directories(&[dir.as_ref().to_path_buf()])
    }

    /// Load several roots with one global deduplication pass
    pub fn load_from_directories(&self, dirs: &[PathBuf]) -> Result<Vec<UsageEntry>> {
        let mut paths = Vec::new();
        for dir in dirs {
            paths.extend(Self::collect_paths(dir)?);
        }
        paths.sort();
        paths.dedup();

        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let threads = self.calculate_optimal_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()?;

        // Parsed in parallel, merged in path order so dedup is deterministic
        let parsed: Vec<(&PathBuf, io::Result<FileParse>)> = pool.install(|| {
            paths
                .par_iter()
                .map(|path| (path, self.process_file(path)))
                .collect()
        });

        let mut seen = HashSet::with_capacity(10_000);
        let mut entries = Vec::new();
        let mut skipped_lines = 0usize;
        let mut failed_files = 0usize;

        for (path, result) in parsed {
            match result {
                Ok(file) => {
                    skipped_lines += file.skipped;
                    for line in file.lines {
                        if Self::is_new(&mut seen, &line) {
                            entries.push(line.entry);
                        }
                    }
                }
                Err(e) => {
                    failed_files += 1;
                    warn!("Failed to load file {}: {}", path.display(), e);
                }
            }
        }

        entries.sort_by_key(|e| e.timestamp);

        debug!("Skipped {} lines without usage data", skipped_lines);
        info!(
            "Loaded {} entries from {} files ({} failed) using {} threads",
            entries.len(),
            paths.len(),
            failed_files,
            threads
        );

        Ok(entries)
    }

    fn is_new(seen: &mut HashSet<String>, parsed: &ParsedLine) -> bool {
        match &parsed.dedup_key {
            Some(key) => seen.insert(key.clone()),
            None => true,
        }
    }

    /// Collect all JSONL file paths below `dir`
    fn collect_paths(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.exists() {
            return Err(UsageError::PathNotFound(dir.to_path_buf()));
        }
        fs::read_dir(dir).map_err(|e| UsageError::io(dir, e))?;

        let walker = WalkBuilder::new(dir)
            .hidden(false)
            .follow_links(false)
            .standard_filters(false)
            .build();

        let mut paths = Vec::new();
        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(source) => {
                    let err = UsageError::Walk {
                        path: dir.to_path_buf(),
                        source,
                    };
                    warn!("{}", err);
                    continue;
                }
            };

            let path = entry.path();
            let is_file = entry.file_type().is_some_and(|t| t.is_file());
            if is_file && path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                paths.push(path.to_path_buf());
            }
        }

        Ok(paths)
    }

    /// Calculate thread count from configuration, environment and core count
    fn calculate_optimal_threads(&self) -> usize {
        if let Some(threads) = self.threads {
            return threads;
        }

        if let Ok(num) = std::env::var("RAYON_NUM_THREADS") {
            if let Ok(n) = num.parse::<usize>() {
                if n > 0 {
                    debug!("Using RAYON_NUM_THREADS={}", n);
                    return n;
                }
            }
        }

        let logical_cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let physical_cores = num_cpus::get_physical();
        let has_hyperthreading = logical_cores > physical_cores;

        // Parsing waits on I/O too, so oversubscribe a little when SMT is present
        let multiplier = if has_hyperthreading { 1.5 } else { 1.0 };
        let threads = ((physical_cores as f64 * multiplier).round() as usize).clamp(2, 16);

        debug!(
            physical_cores,
            logical_cores, has_hyperthreading, threads, "Loader thread pool configuration"
        );

        threads
    }

    fn process_file(&self, path: &Path) -> io::Result<FileParse> {
        let session_id = extract_session_id(path);
        let buffer = Self::read_file_fast(path)?;

        let mut parse = FileParse {
            lines: Vec::new(),
            skipped: 0,
        };

        Self::for_each_line(buffer.as_bytes(), |line| {
            match parse_line(line, &session_id, &self.pricing) {
                Ok(parsed) => parse.lines.push(parsed),
                Err(TranscriptError::Blank) => {}
                Err(_) => parse.skipped += 1,
            }
        });

        Ok(parse)
    }

    /// Read file using optimal strategy based on size
    fn read_file_fast(path: &Path) -> io::Result<FileBuf> {
        let size = fs::metadata(path)?.len();

        if size <= MMAP_THRESHOLD {
            Ok(FileBuf::Owned(fs::read(path)?))
        } else {
            let file = File::open(path)?;
            // SAFETY: the map is read-only and dropped before this load returns;
            // transcripts are append-only so existing bytes are not rewritten.
            let mmap = unsafe { Mmap::map(&file)? };
            Ok(FileBuf::Mapped(mmap))
        }
    }

    /// Iterate over lines in a byte buffer, trimming CRLF endings
    fn for_each_line(buffer: &[u8], mut callback: impl FnMut(&[u8])) {
        let mut start = 0;

        for newline_pos in memchr_iter(b'\n', buffer) {
            let mut end = newline_pos;

            if end > start && buffer[end - 1] == b'\r' {
                end -= 1;
            }

            if end > start {
                callback(&buffer[start..end]);
            }

            start = newline_pos + 1;
        }

        // Last line without newline
        if start < buffer.len() {
            callback(&buffer[start..]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    const FIRST: &str = r#"{"timestamp": "2024-01-01T12:00:00Z", "model": "claude-3-sonnet-20240229", "usage": {"input_tokens": 100, "output_tokens": 50, "cache_creation_input_tokens": 0, "cache_read_input_tokens": 0}, "cost_usd": 0.001}"#;
    const SECOND: &str = r#"{"timestamp": "2024-01-01T13:00:00Z", "model": "claude-3-sonnet-20240229", "usage": {"input_tokens": 200, "output_tokens": 100, "cache_creation_input_tokens": 0, "cache_read_input_tokens": 0}, "cost_usd": 0.002}"#;

    fn transcript_line(ts: &str, msg: &str, req: &str, input: u64) -> String {
        format!(
            r#"{{"type":"assistant","timestamp":"{}","requestId":"{}","message":{{"id":"{}","model":"claude-sonnet-4-20250514","usage":{{"input_tokens":{},"output_tokens":10}}}}}}"#,
            ts, req, msg, input
        )
    }

    #[test]
    fn test_for_each_line_handles_crlf_and_tail() {
        let mut lines = Vec::new();
        DataLoader::for_each_line(b"a\r\nbb\n\nccc", |l| lines.push(l.to_vec()));
        assert_eq!(lines, vec![b"a".to_vec(), b"bb".to_vec(), b"ccc".to_vec()]);
    }

    #[test]
    fn test_load_from_file() {
        let loader = DataLoader::new();
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}\n\n{}\nnot json\n", FIRST, SECOND).unwrap();

        let entries = loader.load_from_file(temp_file.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].input_tokens, 100);
        assert_eq!(entries[1].input_tokens, 200);
    }

    #[test]
    fn test_load_from_file_skips_invalid_utf8_line() {
        let loader = DataLoader::new();
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(FIRST.as_bytes()).unwrap();
        temp_file.write_all(b"\n\xff\xfe garbage\r\n").unwrap();
        temp_file.write_all(SECOND.as_bytes()).unwrap();
        temp_file.write_all(b"\r\n").unwrap();

        let entries = loader.load_from_file(temp_file.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].input_tokens, 200);
    }

    #[test]
    fn test_trim_line_end() {
        assert_eq!(trim_line_end(b"abc\r\n"), b"abc");
        assert_eq!(trim_line_end(b"abc\n"), b"abc");
        assert_eq!(trim_line_end(b"abc"), b"abc");
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let loader = DataLoader::new();
        let err = loader
            .load_from_file("/definitely/not/here.jsonl")
            .unwrap_err();
        assert!(matches!(err, UsageError::Io { .. }));
    }

    #[test]
    fn test_load_missing_directory_is_error() {
        let loader = DataLoader::new();
        let err = loader
            .load_from_directory("/definitely/not/here")
            .unwrap_err();
        assert!(matches!(err, UsageError::PathNotFound(_)));
    }

    #[test]
    fn test_load_from_directory_recursive_sorted() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("project-a");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("s1.jsonl"), format!("{}\n", SECOND)).unwrap();
        fs::write(dir.path().join("s2.jsonl"), format!("{}\n", FIRST)).unwrap();
        fs::write(dir.path().join("notes.txt"), FIRST).unwrap();

        let entries = DataLoader::new()
            .with_threads(2)
            .load_from_directory(dir.path())
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].timestamp < entries[1].timestamp);
        assert_eq!(entries[0].session_id, "s2");
        assert_eq!(entries[1].session_id, "s1");
    }

    #[test]
    fn test_duplicates_counted_once() {
        let dir = TempDir::new().unwrap();
        let line = transcript_line("2024-01-01T12:00:00Z", "msg_1", "req_1", 100);
        let other = transcript_line("2024-01-01T12:05:00Z", "msg_2", "req_2", 300);
        fs::write(dir.path().join("a.jsonl"), format!("{}\n{}\n", line, line)).unwrap();
        fs::write(dir.path().join("b.jsonl"), format!("{}\n{}\n", line, other)).unwrap();

        let loader = DataLoader::new().with_threads(2);
        let entries = loader.load_from_directory(dir.path()).unwrap();
        assert_eq!(entries.len(), 2);
        // First occurrence by path order is kept
        assert_eq!(entries[0].session_id, "a");

        let single = loader.load_from_file(dir.path().join("a.jsonl")).unwrap();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_large_file_is_mapped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.jsonl");
        let mut content = String::new();
        let mut count = 0;
        while content.len() as u64 <= MMAP_THRESHOLD {
            content.push_str(FIRST);
            content.push('\n');
            count += 1;
        }
        fs::write(&path, content).unwrap();

        assert!(matches!(
            DataLoader::read_file_fast(&path).unwrap(),
            FileBuf::Mapped(_)
        ));
        let entries = DataLoader::new()
            .with_threads(1)
            .load_from_directory(dir.path())
            .unwrap();
        assert_eq!(entries.len(), count);
    }

    #[test]
    fn test_load_from_directories_merges_roots() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let line = transcript_line("2024-01-01T12:00:00Z", "msg_1", "req_1", 100);
        fs::write(a.path().join("x.jsonl"), format!("{}\n", line)).unwrap();
        fs::write(b.path().join("y.jsonl"), format!("{}\n{}\n", line, SECOND)).unwrap();

        let entries = DataLoader::new()
            .with_threads(2)
            .load_from_directories(&[a.path().to_path_buf(), b.path().to_path_buf()])
            .unwrap();
        assert_eq!(entries.len(), 2);
    }
}
