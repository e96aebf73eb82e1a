//! Generation of Cython wrapper sources from declarative descriptions of
//! native C/C++ classes and functions.
//!
//! An [`Environment`] describes target modules; [`Generator`] turns each
//! into three files: a declaration header externing the native API, a
//! re-export header declaring the wrapper classes, and an implementation
//! module with the extension classes, boundary conversions, and overload
//! dispatchers. Type rendering and conversion go through the injected
//! [`TypeSystem`] service; [`BuiltinTypeSystem`] covers scalars, strings,
//! vectors, refinements, and registered wrapped classes.

pub mod config;
pub mod context;
pub mod cython_gen;
pub mod document;
pub mod error;
pub mod expand;
pub mod naming;
pub mod schema;
pub mod typesystem;

use std::collections::BTreeMap;
use std::fs;

pub use config::Config;
pub use context::Filenames;
pub use cython_gen::Generator;
pub use error::{GenError, GenResult};
pub use schema::Environment;
pub use typesystem::{BuiltinTypeSystem, TypeSystem};

/// Run a full generation pass: load the environment, generate all three
/// file families, write them into the output directory, and sanity-check
/// the result.
pub fn run_generate(config: &Config) -> GenResult<()> {
    let raw = fs::read_to_string(&config.paths.env_input)?;
    let env: Environment = match config.paths.env_input.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&raw)?,
        _ => serde_json::from_str(&raw)?,
    };
    log::info!(
        "loaded {} module description(s) from {}",
        env.len(),
        config.paths.env_input.display()
    );
    schema::validate_env(&env)?;

    let mut filenames = Filenames::new();
    let mut ts = BuiltinTypeSystem::new();
    ts.register_env(&env, &mut filenames);

    let mut generator = Generator::new(&ts).with_exception(config.exception_annotation());
    let files = generator.generate_all(&env)?;
    verify_output(&files);

    fs::create_dir_all(&config.paths.out_dir)?;
    for (name, text) in &files {
        let path = config.paths.out_dir.join(name);
        fs::write(&path, text)?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}

/// Cross-check the generated set: every locally-cimported stem should have
/// a generated header backing it. Standard library modules (`libc.*`,
/// `libcpp.*`) live outside the set and are skipped.
fn verify_output(files: &BTreeMap<String, String>) {
    let stems: std::collections::BTreeSet<&str> =
        files.keys().map(|name| context::file_stem(name)).collect();
    for (name, text) in files {
        if text.trim().is_empty() {
            log::warn!("{name} was generated empty");
        }
        for line in text.lines() {
            let stem = if let Some(rest) = line.strip_prefix("cimport ") {
                rest
            } else if let Some(rest) = line.strip_prefix("from ") {
                match rest.split_once(" cimport ") {
                    Some((module, _)) => module,
                    None => continue,
                }
            } else {
                continue;
            };
            if stem.contains('.') {
                continue;
            }
            if !stems.contains(stem) {
                log::warn!("{name} cimports {stem}, which this run did not generate");
            }
        }
    }
}
