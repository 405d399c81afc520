//! Shard discovery and parallel document processing.

use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::ops::AddAssign;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use ignore::WalkBuilder;
use wikimath_core::Pipeline;
use wikimath_core::WikiDocument;
use wikimath_core::WikiMathError;
use wikimath_core::WikiMathResult;

/// Document counts for one or more shards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardSummary {
	/// Documents written to the output.
	pub processed: usize,
	/// Documents skipped because a step failed.
	pub failed: usize,
	/// Processed documents whose text came out identical.
	pub unchanged: usize,
}

impl AddAssign for ShardSummary {
	fn add_assign(&mut self, other: Self) {
		self.processed += other.processed;
		self.failed += other.failed;
		self.unchanged += other.unchanged;
	}
}

fn build_glob_set(patterns: &[String]) -> WikiMathResult<GlobSet> {
	let mut builder = GlobSetBuilder::new();
	for pattern in patterns {
		let glob = Glob::new(pattern).map_err(|e| {
			WikiMathError::InvalidPattern {
				pattern: pattern.clone(),
				reason: e.to_string(),
			}
		})?;
		builder.add(glob);
	}

	builder.build().map_err(|e| {
		WikiMathError::InvalidPattern {
			pattern: patterns.join(", "),
			reason: e.to_string(),
		}
	})
}

/// Find the shard files under `input` whose path relative to `input`
/// matches one of `patterns`. `.gitignore` files are respected. A file passed
/// as `input` is returned as is.
pub fn discover_shards(input: &Path, patterns: &[String]) -> WikiMathResult<Vec<PathBuf>> {
	if input.is_file() {
		return Ok(vec![input.to_path_buf()]);
	}
	if !input.is_dir() {
		return Err(WikiMathError::Io(std::io::Error::new(
			std::io::ErrorKind::NotFound,
			format!("input `{}` does not exist", input.display()),
		)));
	}

	let include = build_glob_set(patterns)?;
	let mut shards = Vec::new();

	for entry in WalkBuilder::new(input).hidden(false).require_git(false).build() {
		let entry = match entry {
			Ok(entry) => entry,
			Err(e) => {
				tracing::warn!("skipping unreadable entry: {e}");
				continue;
			}
		};
		if !entry.file_type().is_some_and(|kind| kind.is_file()) {
			continue;
		}

		let path = entry.path();
		let relative = path.strip_prefix(input).unwrap_or(path);
		if include.is_match(relative) {
			shards.push(path.to_path_buf());
		}
	}

	shards.sort();
	Ok(shards)
}

/// Where `shard` goes under `output`, keeping its path relative to `input`.
pub fn output_path(input: &Path, shard: &Path, output: &Path) -> PathBuf {
	match shard.strip_prefix(input) {
		Ok(relative) if !relative.as_os_str().is_empty() => output.join(relative),
		_ => output.join(shard.file_name().unwrap_or(shard.as_os_str())),
	}
}

/// Run `pipeline` over every document on `workers` threads. Results come
/// back in input order.
pub fn process_documents(
	pipeline: &Pipeline<'_>,
	documents: &[WikiDocument],
	workers: usize,
) -> Vec<WikiMathResult<String>> {
	let cursor = AtomicUsize::new(0);
	let workers = workers.clamp(1, documents.len().max(1));

	let mut indexed: Vec<(usize, WikiMathResult<String>)> = std::thread::scope(|scope| {
		let handles: Vec<_> = (0..workers)
			.map(|_| {
				scope.spawn(|| {
					let mut done = Vec::new();
					loop {
						let index = cursor.fetch_add(1, Ordering::Relaxed);
						let Some(document) = documents.get(index) else {
							break;
						};
						done.push((index, pipeline.process(document)));
					}
					done
				})
			})
			.collect();

		handles
			.into_iter()
			.flat_map(|handle| {
				match handle.join() {
					Ok(done) => done,
					Err(panic) => std::panic::resume_unwind(panic),
				}
			})
			.collect()
	});

	indexed.sort_by_key(|(index, _)| *index);
	indexed.into_iter().map(|(_, result)| result).collect()
}

fn is_gzip(path: &Path) -> bool {
	path.extension().is_some_and(|extension| extension == "gz")
}

/// Read a shard, decompressing it when the file name ends in `.gz`.
pub fn read_shard(path: &Path) -> WikiMathResult<String> {
	if !is_gzip(path) {
		return Ok(fs::read_to_string(path)?);
	}

	let mut content = String::new();
	MultiGzDecoder::new(File::open(path)?).read_to_string(&mut content)?;
	Ok(content)
}

/// Write a shard, compressing it when the file name ends in `.gz`.
pub fn write_shard(path: &Path, body: &str) -> WikiMathResult<()> {
	if !is_gzip(path) {
		return Ok(fs::write(path, body)?);
	}

	let mut encoder = GzEncoder::new(BufWriter::new(File::create(path)?), Compression::default());
	encoder.write_all(body.as_bytes())?;
	encoder.finish()?.flush()?;
	Ok(())
}

/// Process one JSONL shard and write the surviving documents to `output`.
pub fn process_shard(
	pipeline: &Pipeline<'_>,
	shard: &Path,
	output: &Path,
	workers: usize,
) -> WikiMathResult<ShardSummary> {
	let content = read_shard(shard)?;
	let mut summary = ShardSummary::default();
	let mut documents = Vec::new();

	for (number, line) in content.lines().enumerate() {
		if line.trim().is_empty() {
			continue;
		}
		match serde_json::from_str::<WikiDocument>(line) {
			Ok(document) => documents.push(document),
			Err(e) => {
				tracing::warn!(shard = %shard.display(), line = number + 1, "malformed document: {e}");
				summary.failed += 1;
			}
		}
	}

	let results = process_documents(pipeline, &documents, workers);
	let mut lines = Vec::with_capacity(documents.len());

	for (mut document, result) in documents.into_iter().zip(results) {
		match result {
			Ok(text) => {
				if document.text.as_deref() == Some(text.as_str()) {
					summary.unchanged += 1;
				}
				document.text = Some(text);
				lines.push(serde_json::to_string(&document)?);
				summary.processed += 1;
			}
			Err(e) => {
				tracing::warn!(
					id = document.id(),
					source = document.source(),
					"failed to process document: {e}"
				);
				summary.failed += 1;
			}
		}
	}

	if let Some(parent) = output.parent() {
		fs::create_dir_all(parent)?;
	}
	let mut body = lines.join("\n");
	if !body.is_empty() {
		body.push('\n');
	}
	write_shard(output, &body)?;

	tracing::info!(
		shard = %shard.display(),
		processed = summary.processed,
		failed = summary.failed,
		"finished shard"
	);
	Ok(summary)
}

/// Read a JSONL file into a map from document id to text. Documents without
/// an id are skipped.
pub fn read_texts(path: &Path) -> WikiMathResult<BTreeMap<String, String>> {
	let content = read_shard(path)?;
	let mut texts = BTreeMap::new();

	for line in content.lines().filter(|line| !line.trim().is_empty()) {
		let document: WikiDocument = serde_json::from_str(line)?;
		if let Some(id) = document.id {
			texts.insert(id, document.text.unwrap_or_default());
		}
	}

	Ok(texts)
}
