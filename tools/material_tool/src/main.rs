//! Command-line inspection of material definition files

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};

use material_table::foundation::logging::{self, LevelFilter};
use material_table::materials::{material_asset, MaterialLibrary, MaterialLoader, MaterialRecord};
use material_table::{Config, LoaderConfig};

fn cli() -> Command {
    Command::new("material_tool")
        .about("Validates, inspects and exports material definition files")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Loader settings (.toml or .ron)")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log output (-v debug, -vv trace)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            Command::new("check")
                .about("Load files or directory trees and report each material group")
                .arg(
                    Arg::new("paths")
                        .value_name("PATH")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("resolve")
                .about("Show which material each mesh slot binds to")
                .arg(file_arg())
                .arg(
                    Arg::new("slots")
                        .value_name("SLOT")
                        .required(true)
                        .num_args(1..),
                ),
        )
        .subcommand(
            Command::new("dump")
                .about("Print every material in declaration order")
                .arg(file_arg()),
        )
        .subcommand(
            Command::new("export")
                .about("Write a material file as a RON asset")
                .arg(file_arg())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Output path (defaults to the input with a .ron extension)")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
}

fn file_arg() -> Arg {
    Arg::new("file")
        .value_name("FILE")
        .required(true)
        .value_parser(value_parser!(PathBuf))
}

fn main() -> Result<()> {
    let matches = cli().get_matches();

    let level = match matches.get_count("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    logging::init_with_level(level);

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => LoaderConfig::load_from_file(path)
            .with_context(|| format!("Failed to load loader config {}", path.display()))?,
        None => LoaderConfig::default(),
    };

    match matches.subcommand() {
        Some(("check", sub)) => check(sub, config),
        Some(("resolve", sub)) => resolve(sub, config),
        Some(("dump", sub)) => dump(sub, config),
        Some(("export", sub)) => export(sub, config),
        _ => unreachable!("clap requires a subcommand"),
    }
}

fn required_path<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a Path> {
    matches
        .get_one::<PathBuf>(id)
        .map(PathBuf::as_path)
        .with_context(|| format!("Missing argument <{id}>"))
}

fn check(matches: &ArgMatches, config: LoaderConfig) -> Result<()> {
    let paths: Vec<PathBuf> = matches
        .get_many::<PathBuf>("paths")
        .into_iter()
        .flatten()
        .cloned()
        .collect();
    check_paths(&paths, config).map(|_| ())
}

/// Load every path as one or more groups and print a summary
///
/// # Returns
/// The populated library, or an error when any group failed so the process
/// exits non-zero
fn check_paths(paths: &[PathBuf], config: LoaderConfig) -> Result<MaterialLibrary> {
    let mut library = MaterialLibrary::new(config);
    let mut failures = 0;

    for path in paths {
        if path.is_dir() {
            let report = library.load_dir(path);
            for failure in &report.failed {
                println!("FAIL {}: {}", failure.path.display(), failure.error);
            }
            failures += report.failed.len();
        } else if let Err(e) = library.load_group_file(path) {
            println!("FAIL {}: {}", path.display(), e);
            failures += 1;
        }
    }

    for (_, group) in library.iter() {
        let path = group.path().map_or_else(String::new, |p| p.display().to_string());
        println!("ok   {:<24} {:>3} material(s)  {}", group.name(), group.table().len(), path);
    }
    println!(
        "{} group(s), {} material(s), {} failure(s)",
        library.len(),
        library.material_count(),
        failures
    );

    if failures > 0 {
        bail!("{failures} material group(s) failed to load");
    }
    Ok(library)
}

fn resolve(matches: &ArgMatches, config: LoaderConfig) -> Result<()> {
    let file = required_path(matches, "file")?;
    let table = MaterialLoader::new(config)
        .load_file(file)
        .with_context(|| format!("Failed to load {}", file.display()))?;

    let slots = matches.get_many::<String>("slots").into_iter().flatten();
    let binding = table.bind_mesh(slots);
    for (slot, record) in binding.iter() {
        println!("{slot} -> {}", record.name());
    }
    for warning in binding.unresolved() {
        println!("warning: {warning}");
    }
    Ok(())
}

fn dump(matches: &ArgMatches, config: LoaderConfig) -> Result<()> {
    let file = required_path(matches, "file")?;
    let table = MaterialLoader::new(config)
        .load_file(file)
        .with_context(|| format!("Failed to load {}", file.display()))?;

    for record in &table {
        print_record(record);
    }
    Ok(())
}

fn print_record(record: &MaterialRecord) {
    println!("{} (mapTo \"{}\")", record.name(), record.map_to());

    for stage in 0..record.stage_count().max(1) {
        println!("  stage {stage}:");
        if let Some(map) = record.diffuse_map(stage) {
            println!("    diffuseMap      {map}");
        }
        if let Some(map) = record.normal_map(stage) {
            println!("    normalMap       {map}");
        }
        let diffuse = record.diffuse_color(stage);
        println!(
            "    diffuseColor    {:.3} {:.3} {:.3} {:.3}",
            diffuse.x, diffuse.y, diffuse.z, diffuse.w
        );
        let specular = record.specular(stage);
        println!(
            "    specular        {:.3} {:.3} {:.3} {:.3}  power {}",
            specular.x,
            specular.y,
            specular.z,
            specular.w,
            record.specular_power(stage)
        );
        println!(
            "    pixelSpecular {}  useAnisotropic {}  subSurface {}",
            record.pixel_specular(stage),
            record.use_anisotropic(stage),
            record.sub_surface(stage)
        );
    }

    println!(
        "  blend {}  doubleSided {}  alphaTest {} (ref {})",
        record.translucent_blend_op(),
        record.double_sided(),
        record.alpha_test(),
        record.alpha_ref()
    );
    for extra in record.extras() {
        match extra.stage {
            Some(stage) => println!("  {}[{stage}] = \"{}\"", extra.key, extra.value),
            None => println!("  {} = \"{}\"", extra.key, extra.value),
        }
    }
}

fn export(matches: &ArgMatches, config: LoaderConfig) -> Result<()> {
    let file = required_path(matches, "file")?;
    let output = matches.get_one::<PathBuf>("output").map(PathBuf::as_path);
    export_file(file, output, config).map(|_| ())
}

/// Write `file` as a RON asset
///
/// # Arguments
/// * `file` - Material script or asset to load
/// * `output` - Destination; defaults to `file` with a `.ron` extension
///
/// # Returns
/// The path that was written
fn export_file(file: &Path, output: Option<&Path>, config: LoaderConfig) -> Result<PathBuf> {
    let output = output.map_or_else(|| file.with_extension("ron"), Path::to_path_buf);
    if output == file {
        bail!("Refusing to overwrite the input file {}", file.display());
    }

    // Load and serialize
    let table = MaterialLoader::new(config)
        .load_file(file)
        .with_context(|| format!("Failed to load {}", file.display()))?;
    let ron = material_asset::to_ron(&table).context("Failed to serialize material asset")?;

    std::fs::write(&output, ron).with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Exported {} material(s) to {}", table.len(), output.display());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PILLAR: &str = r#"
singleton Material(RuinPillar_01_ConcreteRuff01)
{
   mapTo = "ConcreteRuff01";
   specularPower[0] = "90";
};
"#;

    fn write_group(root: &Path, shape: &str, source: &str) -> PathBuf {
        let dir = root.join(shape);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("materials.cs");
        std::fs::write(&path, source).unwrap();
        path
    }

    #[test]
    fn test_cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_check_succeeds_on_clean_tree() {
        let root = tempfile::tempdir().unwrap();
        write_group(root.path(), "RuinPillar_01", PILLAR);

        let library = check_paths(&[root.path().to_path_buf()], LoaderConfig::default()).unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(library.material_count(), 1);
    }

    #[test]
    fn test_check_fails_when_any_group_fails() {
        let root = tempfile::tempdir().unwrap();
        write_group(root.path(), "RuinPillar_01", PILLAR);
        let broken = write_group(root.path(), "Broken_01", "Material(NoSlot) { };");

        assert!(check_paths(&[root.path().to_path_buf()], LoaderConfig::default()).is_err());
        assert!(check_paths(&[broken], LoaderConfig::default()).is_err());
    }

    #[test]
    fn test_export_writes_loadable_asset() {
        let root = tempfile::tempdir().unwrap();
        let file = write_group(root.path(), "RuinPillar_01", PILLAR);

        let output = export_file(&file, None, LoaderConfig::default()).unwrap();
        assert_eq!(output, root.path().join("RuinPillar_01/materials.ron"));

        let table = MaterialLoader::default().load_file(&output).unwrap();
        assert_eq!(table.resolve("ConcreteRuff01").unwrap().name(), "RuinPillar_01_ConcreteRuff01");
    }

    #[test]
    fn test_export_refuses_to_overwrite_input() {
        let root = tempfile::tempdir().unwrap();
        let file = write_group(root.path(), "RuinPillar_01", PILLAR);
        let asset = export_file(&file, None, LoaderConfig::default()).unwrap();
        let before = std::fs::read_to_string(&asset).unwrap();

        // Default output of a .ron input is the input itself
        assert!(export_file(&asset, None, LoaderConfig::default()).is_err());
        assert!(export_file(&file, Some(file.as_path()), LoaderConfig::default()).is_err());

        assert_eq!(std::fs::read_to_string(&asset).unwrap(), before);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), PILLAR);
    }
}
