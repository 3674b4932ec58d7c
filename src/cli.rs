//! Command line: load descriptor documents, then `check` or `sample` them.
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

use crate::algebra;
use crate::compiler::Compiler;
use crate::contains;
use crate::descriptor::Descriptor;
use crate::harness::RunConfig;
use crate::ir::Module;
use crate::lower;
use crate::path_de;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile type descriptor documents into random value generators and check them
#[derive(Parser, Debug)]
#[command(name = "descgen", version)]
pub struct CommandLineInterface {
    /// log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// check that every named type only generates values it accepts
    Check(CheckCmd),
    /// print generated values of one named type as NDJSON
    Sample(SampleCmd),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// JSON Pointer to the module inside each document (e.g. /definitions)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct RunSettings {
    /// JSON file with run options; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// trials per type
    #[arg(long)]
    cases: Option<u32>,

    /// fixed seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// upper bound on generated collection lengths
    #[arg(long)]
    max_size: Option<usize>,

    /// filter rejections tolerated per check
    #[arg(long)]
    max_rejects: Option<u32>,
}

#[derive(Parser, Debug)]
struct CheckCmd {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    run_settings: RunSettings,

    /// only check types whose name matches this regex
    #[arg(long)]
    only: Option<String>,
}

#[derive(Parser, Debug)]
struct SampleCmd {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    run_settings: RunSettings,

    /// named type to sample
    #[arg(long = "type")]
    type_name: String,

    /// number of values
    #[arg(short = 'n', long, default_value_t = 10)]
    count: usize,

    /// output .ndjson file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    /// Every named type across all inputs, lowered together so references may
    /// cross files.
    fn load(&self) -> Result<IndexMap<String, Descriptor>> {
        let mut merged = Module::new();
        for source_path in resolve_file_path_patterns(&self.input)? {
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read {}", source_path.display()))?;
            let module = lower::load_module(&source, self.json_pointer.as_deref())
                .with_context(|| format!("failed to parse {}", source_path.display()))?;
            for (name, doc) in module {
                if merged.contains_key(&name) {
                    bail!("type `{name}` declared twice (again in {})", source_path.display());
                }
                merged.insert(name, doc);
            }
        }
        lower::lower_module(&merged)
    }
}

impl RunSettings {
    fn resolve(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let src = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                path_de::from_str_with_path::<RunConfig>(&src)
                    .with_context(|| format!("invalid run config {}", path.display()))?
            }
            None => RunConfig::default(),
        };
        if let Some(cases) = self.cases {
            config.cases = cases;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.max_size.is_some() {
            config.max_size = self.max_size;
        }
        if let Some(max_rejects) = self.max_rejects {
            config.max_rejects = max_rejects;
        }
        Ok(config)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Runs the subcommand. `Ok(false)` means a check failed.
    pub fn run(&self) -> Result<bool> {
        match &self.cmd {
            Command::Check(target) => target.run(),
            Command::Sample(target) => target.run().map(|()| true),
        }
    }
}

/// The compiler every command uses: built-ins plus the bundled extensions.
pub fn default_compiler() -> Compiler {
    let mut compiler = Compiler::new();
    contains::register(&mut compiler);
    compiler
}

impl CheckCmd {
    fn run(&self) -> Result<bool> {
        let only = self.only.as_deref().map(Regex::new).transpose()?;
        let config = self.run_settings.resolve()?;
        let types = self.input_settings.load()?;
        let compiler = default_compiler();

        let mut failed = 0usize;
        let mut checked = 0usize;
        for (name, ty) in &types {
            if only.as_ref().is_some_and(|rx| !rx.is_match(name)) {
                continue;
            }
            checked += 1;
            match compiler.check(ty, &config) {
                Ok(report) => {
                    println!("{} {name} ({} cases, seed {})", "pass".green().bold(), report.cases, report.seed);
                }
                Err(error) => {
                    failed += 1;
                    println!("{} {name}: {error}", "FAIL".red().bold());
                }
            }
        }
        if checked == 0 {
            eprintln!("{} no types selected", "warning:".yellow().bold());
        }
        Ok(failed == 0)
    }
}

impl SampleCmd {
    fn run(&self) -> Result<()> {
        let config = self.run_settings.resolve()?;
        let seed = config.resolve_seed();
        if config.seed.is_none() {
            // stdout carries the values; rerun with `--seed` to reproduce them
            eprintln!("{} sampling with seed {seed}", "note:".cyan().bold());
        }
        debug!(seed, type_name = %self.type_name, count = self.count, "sampling");
        let ndjson = self.render(&config, seed)?;
        match self.out.as_ref() {
            Some(out) => write_file(out, &ndjson),
            None => {
                print!("{ndjson}");
                Ok(())
            }
        }
    }

    /// The sampled values as NDJSON, fully determined by `seed`.
    fn render(&self, config: &RunConfig, seed: u64) -> Result<String> {
        let types = self.input_settings.load()?;
        let ty = types
            .get(&self.type_name)
            .with_context(|| format!("no type named `{}`", self.type_name))?;

        let mut compiler = default_compiler();
        if let Some(max_size) = config.max_size {
            compiler = compiler.with_max_size(max_size);
        }
        let generator = compiler.compile(ty)?;
        let mut runner = algebra::seeded_runner(seed, config.max_rejects);
        let values = algebra::sample(&generator, self.count, &mut runner)?;

        let mut ndjson = String::new();
        for value in &values {
            ndjson.push_str(&serde_json::to_string(value)?);
            ndjson.push('\n');
        }
        Ok(ndjson)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_file(out: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

    fn cli(args: &[&str]) -> CommandLineInterface {
        CommandLineInterface::try_parse_from(std::iter::once("descgen").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn parses_check_flags() {
        let c = cli(&["check", "-i", "a.json", "b.json", "--only", "^Ship$", "--cases", "5", "--seed", "9", "-v"]);
        assert!(c.verbose());
        let Command::Check(check) = &c.cmd else { panic!("check expected") };
        assert_eq!(check.input_settings.input, vec!["a.json", "b.json"]);
        let config = check.run_settings.resolve().unwrap();
        assert_eq!((config.cases, config.seed), (5, Some(9)));
    }

    #[test]
    fn sample_requires_a_type() {
        let parsed = CommandLineInterface::try_parse_from(["descgen", "sample", "-i", "a.json"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn checks_fixture_documents() {
        let glob = format!("{FIXTURES}/*.json");
        let c = cli(&["check", "-i", &glob, "--cases", "50", "--seed", "3"]);
        assert!(c.run().unwrap());
    }

    #[test]
    fn only_filters_types() {
        let space = format!("{FIXTURES}/space.json");
        let c = cli(&["check", "-i", &space, "--only", "^Nothing", "--seed", "1"]);
        assert!(c.run().unwrap());
    }

    #[test]
    fn samples_to_a_file() {
        let space = format!("{FIXTURES}/space.json");
        let out = std::env::temp_dir().join(format!("descgen-{}/ranks.ndjson", std::process::id()));
        let out_str = out.to_string_lossy().to_string();
        let c = cli(&["sample", "-i", &space, "--type", "Rank", "-n", "4", "--seed", "2", "--out", &out_str]);
        assert!(c.run().unwrap());

        let written = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(lines.len(), 4);
        for line in lines {
            let rank: String = serde_json::from_str(line).unwrap();
            assert!(["captain", "first mate", "officer", "ensign"].contains(&rank.as_str()));
        }
    }

    #[test]
    fn drawn_sample_seed_reproduces_the_output() {
        let space = format!("{FIXTURES}/space.json");
        let unseeded = cli(&["sample", "-i", &space, "--type", "Ship", "-n", "3"]);
        let Command::Sample(unseeded) = &unseeded.cmd else { panic!("sample expected") };
        let config = unseeded.run_settings.resolve().unwrap();
        assert_eq!(config.seed, None);
        let seed = config.resolve_seed();
        let first = unseeded.render(&config, seed).unwrap();

        let seed_arg = seed.to_string();
        let seeded = cli(&["sample", "-i", &space, "--type", "Ship", "-n", "3", "--seed", &seed_arg]);
        let Command::Sample(seeded) = &seeded.cmd else { panic!("sample expected") };
        let config = seeded.run_settings.resolve().unwrap();
        let again = seeded.render(&config, config.resolve_seed()).unwrap();
        assert_eq!(first, again);
        assert_eq!(first.lines().count(), 3);
    }

    #[test]
    fn unknown_sample_type_is_an_error() {
        let space = format!("{FIXTURES}/space.json");
        let c = cli(&["sample", "-i", &space, "--type", "Comet"]);
        assert!(c.run().is_err());
    }

    #[test]
    fn missing_glob_matches_are_errors() {
        assert!(resolve_file_path_patterns(["/definitely/not/here/*.json"]).is_err());
    }
}
