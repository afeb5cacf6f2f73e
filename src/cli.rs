//! Minimal CLI: infer → JSON-Schema document
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use crate::session::Session;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// infer JSON-Schema type descriptions from JavaScript syntax-tree files
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// interpret the inputs and print the inferred schema document
    Infer(InferOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more inputs: literal paths or quoted glob patterns of
    /// syntax-tree JSON files (esprima output with loc, range and comments)
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct InferOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// document title
    #[arg(long, default_value = crate::session::DEFAULT_TITLE)]
    title: String,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Infer(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }

                // 1) build session state, one input at a time. A bad input is
                //    reported and skipped; the others still contribute.
                let source_paths = resolve_file_path_patterns(&target.input_settings.input)
                    .context("failed to resolve input file paths")?;
                let mut session = Session::with_title(&target.title);
                for source_path in source_paths {
                    if let Err(error) = session.add_file(&source_path) {
                        eprintln!("{} {error}", "error:".red().bold());
                    }
                }
                for warning in session.warnings() {
                    eprintln!(
                        "{} undeclared global `{}` first referenced at {}:{}",
                        "warning:".yellow().bold(),
                        warning.name,
                        warning.line,
                        warning.column,
                    );
                }

                // 2) export
                let document = session.export();
                let document_src = serde_json::to_string_pretty(&document)
                    .context("failed to serialize the schema document")?;
                if let Some(out) = target.out.as_ref() {
                    if let Some(parent) = out.parent() {
                        std::fs::create_dir_all(parent)
                            .with_context(|| format!("failed to create {}", parent.display()))?;
                    }
                    std::fs::write(out, &document_src)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                } else {
                    println!("{document_src}");
                }
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            // Treat as a glob pattern
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                anyhow::bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            // Treat as a literal path
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
