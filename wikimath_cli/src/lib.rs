use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

pub use renderer::*;
pub use shards::*;

mod renderer;
mod shards;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Turn MediaWiki wikitext into plain text while keeping its math as LaTeX.",
	long_about = "wikimath preprocesses wikitext dumps for language-model corpora.\n\nMath \
	              templates and <math> tags are pulled out before the text is sent to a \
	              wikitext renderer and spliced back in as LaTeX afterwards.\n\nQuick \
	              start:\n  wikimath process --input raw --output clean   Process JSONL \
	              shards\n  wikimath math < page.wiki                     Convert one \
	              snippet\n  wikimath compare --old a.jsonl --new b.jsonl   Diff two runs"
)]
pub struct WikiMathCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to a config file. Defaults to `wikimath.toml`, `.wikimath.toml`
	/// or `.config/wikimath.toml` in the current directory.
	#[arg(long, short, global = true)]
	pub config: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Process every JSONL shard under a directory.
	///
	/// Each line is a document with `id`, `text`, `source` and optional
	/// `metadata.title`. The text goes through the full pipeline and the
	/// document is written to the same relative path under `--output`.
	/// Documents that fail are logged and left out of the output.
	Process {
		/// Input directory (or a single shard file).
		#[arg(long, short)]
		input: PathBuf,

		/// Output directory.
		#[arg(long, short)]
		output: PathBuf,

		/// Skip the renderer and pass wikitext through unrendered.
		#[arg(long, default_value_t = false)]
		offline: bool,

		/// Renderer endpoint. Overrides `renderer.url` from the config.
		#[arg(long)]
		renderer: Option<String>,

		/// Number of documents processed in parallel.
		#[arg(long, short)]
		workers: Option<usize>,
	},
	/// Convert the math in wikitext read from stdin.
	///
	/// Runs `<math>` tag conversion and the notation rules without a
	/// renderer, which is handy for checking how a template converts.
	Math,
	/// Show how two runs over the same documents differ.
	///
	/// Documents are matched by `id`; a unified diff is printed for every
	/// document whose text changed.
	Compare {
		/// JSONL file from the earlier run.
		#[arg(long)]
		old: PathBuf,

		/// JSONL file from the later run.
		#[arg(long)]
		new: PathBuf,

		/// Only compare the document with this id.
		#[arg(long)]
		id: Option<String>,
	},
}
