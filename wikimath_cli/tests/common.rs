use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn wikimath_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("wikimath"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("WIKIMATH_LOG");
	cmd
}

/// Serialize `documents` as one JSON object per line.
#[allow(dead_code)]
pub fn jsonl(documents: &[serde_json::Value]) -> String {
	documents
		.iter()
		.map(serde_json::Value::to_string)
		.collect::<Vec<_>>()
		.join("\n")
}
