use std::io::Read;
use std::path::Path;
use std::process;
use std::time::Duration;

use clap::Parser;
use owo_colors::OwoColorize;
use similar::ChangeTag;
use similar::TextDiff;
use tracing_subscriber::EnvFilter;
use wikimath_cli::Commands;
use wikimath_cli::HttpRenderer;
use wikimath_cli::ShardSummary;
use wikimath_cli::WikiMathCli;
use wikimath_cli::discover_shards;
use wikimath_cli::output_path;
use wikimath_cli::process_shard;
use wikimath_cli::read_texts;
use wikimath_core::IdentityRenderer;
use wikimath_core::Pipeline;
use wikimath_core::Renderer;
use wikimath_core::WikiDocument;
use wikimath_core::WikiMathConfig;
use wikimath_core::process_document;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
	let args = WikiMathCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose, use_color);

	let result = match &args.command {
		Some(Commands::Process {
			input,
			output,
			offline,
			renderer,
			workers,
		}) => {
			run_process(
				&args,
				input,
				output,
				*offline,
				renderer.as_deref(),
				*workers,
			)
		}
		Some(Commands::Math) => run_math(),
		Some(Commands::Compare { old, new, id }) => run_compare(old, new, id.as_deref()),
		None => {
			eprintln!("No subcommand specified. Run `wikimath --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		match e.downcast::<wikimath_core::WikiMathError>() {
			Ok(wikimath_err) => {
				let report: miette::Report = (*wikimath_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Logs go to stderr, filtered by `WIKIMATH_LOG` when it is set.
fn init_tracing(verbose: bool, use_color: bool) {
	let fallback = if verbose { "debug" } else { "info" };
	let filter =
		EnvFilter::try_from_env("WIKIMATH_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.init();
}

fn load_config(args: &WikiMathCli) -> Result<WikiMathConfig, Box<dyn std::error::Error>> {
	if let Some(path) = &args.config {
		return Ok(WikiMathConfig::load_from(path)?);
	}

	let root = std::env::current_dir()?;
	Ok(WikiMathConfig::load(&root)?.unwrap_or_default())
}

fn run_process(
	args: &WikiMathCli,
	input: &Path,
	output: &Path,
	offline: bool,
	renderer_url: Option<&str>,
	workers: Option<usize>,
) -> CliResult {
	let config = load_config(args)?;
	let workers = workers.or(config.workers).unwrap_or_else(|| {
		std::thread::available_parallelism()
			.map(std::num::NonZeroUsize::get)
			.unwrap_or(1)
	});

	let renderer: Box<dyn Renderer> = if offline {
		Box::new(IdentityRenderer::new(config.renderer.mode))
	} else {
		let url = renderer_url.unwrap_or(&config.renderer.url);
		tracing::debug!(url, "using renderer");
		Box::new(HttpRenderer::new(
			url,
			Duration::from_secs(config.renderer.timeout_secs),
		))
	};
	let pipeline = Pipeline::from_config(renderer.as_ref(), &config)?;

	let shards = discover_shards(input, &config.input.patterns)?;
	if shards.is_empty() {
		println!(
			"{} no shard files found under {}",
			colored!("!", yellow),
			input.display()
		);
		return Ok(());
	}

	let mut summary = ShardSummary::default();
	for shard in &shards {
		let destination = output_path(input, shard, output);
		summary += process_shard(&pipeline, shard, &destination, workers)?;
	}

	let failed = if summary.failed > 0 {
		colored!(format!("{} failed", summary.failed), red)
	} else {
		format!("{} failed", summary.failed)
	};
	println!(
		"{} {} processed, {failed}, {} unchanged across {} shard(s)",
		colored!("✓", green),
		colored!(summary.processed, bold),
		summary.unchanged,
		shards.len()
	);

	Ok(())
}

fn run_math() -> CliResult {
	let mut input = String::new();
	std::io::stdin().read_to_string(&mut input)?;

	let text = process_document(&IdentityRenderer::default(), &WikiDocument::new(input))?;
	println!("{text}");

	Ok(())
}

fn run_compare(old: &Path, new: &Path, only: Option<&str>) -> CliResult {
	let old_texts = read_texts(old)?;
	let new_texts = read_texts(new)?;
	let mut changed = 0;
	let mut missing = 0;

	for (id, old_text) in &old_texts {
		if only.is_some_and(|only| only != id) {
			continue;
		}
		let Some(new_text) = new_texts.get(id) else {
			missing += 1;
			continue;
		};
		if old_text == new_text {
			continue;
		}

		changed += 1;
		println!("{}", colored!(format!("=== {id}"), bold));
		print_diff(old_text, new_text);
	}

	let added = new_texts
		.keys()
		.filter(|id| !old_texts.contains_key(*id))
		.filter(|id| only.is_none_or(|only| only == id.as_str()))
		.count();

	println!(
		"\n{changed} changed, {missing} only in {}, {added} only in {}",
		old.display(),
		new.display()
	);

	Ok(())
}

fn print_diff(current: &str, expected: &str) {
	let diff = TextDiff::from_lines(current, expected);
	for change in diff.iter_all_changes() {
		match change.tag() {
			ChangeTag::Delete => {
				print!("  {}", colored!(format!("-{change}"), red));
			}
			ChangeTag::Insert => {
				print!("  {}", colored!(format!("+{change}"), green));
			}
			ChangeTag::Equal => {
				print!("   {change}");
			}
		}
		if change.missing_newline() {
			println!();
		}
	}
}
