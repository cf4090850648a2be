//! cfn-schema CLI
//!
//! Command-line interface for resolving resource schemas and normalizing
//! template properties.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cfn_schema::{
    lint, load_document, load_resource_schema, normalize_template, FileStatus, PathOptions,
    SchemaRegistry, Severity,
};
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "cfn-schema")]
#[command(about = "Resolve CloudFormation resource schemas and normalize template properties")]
#[command(version)]
struct Cli {
    /// Log resolution details to stderr (same as RUST_LOG=debug)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the schema fragments that apply at a property path
    Resolve {
        /// Resource schema file
        schema: PathBuf,

        /// Property path (e.g. /properties/Tags/*/Key); the root if omitted
        #[arg(long, short, default_value = "")]
        path: String,

        /// Drop read-only properties from the result
        #[arg(long)]
        exclude_read_only: bool,

        /// Return nothing unless every path segment matches
        #[arg(long)]
        require_fully_resolved: bool,

        /// Keep oneOf/anyOf/allOf on the resolved fragment instead of expanding it
        #[arg(long)]
        preserve_composition: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// List the attributes a resource exposes
    Attributes {
        /// Resource schema file
        schema: PathBuf,

        /// Output as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Remove conflicting properties from a template's resources
    Normalize {
        /// Template file (JSON)
        template: PathBuf,

        /// Directory of resource schema files
        #[arg(long)]
        schemas: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Lint resource schema files (syntax, required fields, broken refs, paths)
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let result = match cli.command {
        Commands::Resolve {
            schema,
            path,
            exclude_read_only,
            require_fully_resolved,
            preserve_composition,
            pretty,
        } => {
            let options = PathOptions::new()
                .exclude_read_only(exclude_read_only)
                .require_fully_resolved(require_fully_resolved)
                .preserve_composition(preserve_composition);
            run_resolve(&schema, &path, &options, pretty)
        }

        Commands::Attributes { schema, json } => run_attributes(&schema, json),

        Commands::Normalize {
            template,
            schemas,
            output,
            pretty,
        } => run_normalize(&template, &schemas, output, pretty),

        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String, u8> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })
}

fn run_resolve(schema_path: &Path, path: &str, options: &PathOptions, pretty: bool) -> Result<(), u8> {
    let schema = load_resource_schema(schema_path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let fragments = schema.resolve_json_pointer_path(path, options);
    println!("{}", to_json(&fragments, pretty)?);
    Ok(())
}

fn run_attributes(schema_path: &Path, json: bool) -> Result<(), u8> {
    let schema = load_resource_schema(schema_path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    if json {
        println!("{}", to_json(&schema.attributes(), true)?);
    } else {
        for attribute in schema.attributes() {
            println!("{}\t{}", attribute.name, attribute.description);
        }
    }
    Ok(())
}

fn run_normalize(template_path: &Path, schemas: &Path, output: Option<PathBuf>, pretty: bool) -> Result<(), u8> {
    let registry = SchemaRegistry::from_dir(schemas).map_err(|e| {
        eprintln!("Error loading schemas: {}", e);
        e.exit_code() as u8
    })?;

    let mut template = load_document(template_path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let normalized = normalize_template(&mut template, &registry);
    log::info!(
        "normalized {} resource(s) using {} schema(s)",
        normalized.len(),
        registry.len()
    );

    let json_output = to_json(&template, pretty)?;
    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(3);
    }

    let result = lint(path, strict);

    if format == "json" {
        println!("{}", to_json(&result, true)?);
    } else {
        if !quiet {
            println!("Linting {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                match &file_result.type_name {
                    Some(type_name) => println!(
                        "  {} {} ({})",
                        status_icon,
                        file_result.file.display(),
                        type_name
                    ),
                    None => println!("  {} {}", status_icon, file_result.file.display()),
                }
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if result.is_ok() && (!strict || result.warnings == 0) {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.is_ok() && (!strict || result.warnings == 0) {
        Ok(())
    } else {
        Err(1)
    }
}
