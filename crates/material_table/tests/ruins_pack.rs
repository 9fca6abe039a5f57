//! Loads the shipped ruins prop pack end to end

use std::path::PathBuf;

use approx::assert_relative_eq;
use material_table::foundation::math::rgba;
use material_table::materials::{material_asset, BlendOp, MaterialLibrary, MaterialLoader};
use material_table::LoaderConfig;

fn ruins_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets/environments/ruins")
}

fn load_library() -> MaterialLibrary {
    let mut library = MaterialLibrary::new(LoaderConfig::default());
    let report = library.load_dir(ruins_dir());
    assert!(report.is_clean(), "failed groups: {:?}", report.failed);
    library
}

#[test]
fn test_every_group_loads() {
    let library = load_library();

    assert_eq!(library.len(), 10);
    assert_eq!(library.material_count(), 44);

    let expected = [
        ("CathedralRuins_01", 7),
        ("FoundationRuin_01", 2),
        ("PillarSegment_01", 3),
        ("RomanTypeCol_01", 3),
        ("RuinArch_01", 6),
        ("RuinPillar_01", 2),
        ("RuinWallSegment_01", 4),
        ("SpeakingStones_01", 3),
        ("TempleRuin_01", 8),
        ("TempleRuin_02", 6),
    ];
    for (name, count) in expected {
        let group = library
            .group_by_name(name)
            .unwrap_or_else(|| panic!("group {name} missing"));
        assert_eq!(group.table().len(), count, "record count for {name}");
    }
}

#[test]
fn test_every_record_resolves_to_itself() {
    let library = load_library();

    for (handle, group) in library.iter() {
        for record in group.table() {
            let resolved = library.resolve(handle, record.map_to()).unwrap();
            assert_eq!(resolved.name(), record.name());
            assert!(std::ptr::eq(resolved, group.table().get(record.name()).unwrap()));
        }
    }
}

#[test]
fn test_overhang_vine_values() {
    let library = load_library();
    let handle = library.handle("TempleRuin_02").unwrap();
    let record = library.resolve(handle, "OverhangVino1").unwrap();

    assert_eq!(record.name(), "TempleRuin_02_OverhangVino1");
    assert_eq!(record.diffuse_map(0), Some("3td_OverhangVino_01"));
    assert_eq!(record.normal_map(0), Some("3td_OverhangVino_01_NRM.png"));
    assert_relative_eq!(record.specular_power(0), 71.0);
    assert_relative_eq!(record.specular(0), rgba(0.956_863, 0.972_549, 0.898_039, 1.0));
    assert!(record.double_sided());
    assert!(record.alpha_test());
    assert_eq!(record.alpha_ref(), 150);
    assert!(record.sub_surface(0));
    assert_relative_eq!(record.sub_surface_color(0), rgba(0.882_353, 1.0, 0.0, 1.0));
    assert!(record.use_anisotropic(0));
    assert!(record.pixel_specular(0));
    assert_eq!(record.translucent_blend_op(), BlendOp::None);
    assert!(record.extras().is_empty());
}

#[test]
fn test_pillar_concrete_values() {
    let library = load_library();
    let handle = library.handle("RuinPillar_01").unwrap();
    let record = library.resolve(handle, "ConcreteRuff01").unwrap();

    assert_eq!(record.name(), "RuinPillar_01_ConcreteRuff01");
    assert_relative_eq!(record.specular_power(0), 90.0);
    assert_relative_eq!(record.specular(0), rgba(0.9, 0.9, 0.9, 1.0));
    assert!(!record.double_sided());
    assert!(!record.alpha_test());
    assert_eq!(record.stage_count(), 1);
}

#[test]
fn test_unmapped_slot_falls_back() {
    let library = load_library();
    let handle = library.handle("RuinPillar_01").unwrap();

    let binding = library.bind_mesh(handle, ["ConcreteRuff01", "NotInThisPack"]).unwrap();
    assert!(!binding.is_fully_resolved());
    assert_eq!(binding.material("ConcreteRuff01").unwrap().name(), "RuinPillar_01_ConcreteRuff01");
    assert_eq!(binding.material("NotInThisPack").unwrap().name(), "DefaultMaterial");
}

#[test]
fn test_ron_export_round_trip() {
    let loader = MaterialLoader::default();
    let out_dir = tempfile::tempdir().unwrap();

    for shape in ["CathedralRuins_01", "TempleRuin_02"] {
        let table = loader.load_file(ruins_dir().join(shape).join("materials.cs")).unwrap();

        let asset_path = out_dir.path().join(format!("{shape}.ron"));
        std::fs::write(&asset_path, material_asset::to_ron(&table).unwrap()).unwrap();
        let imported = loader.load_file(&asset_path).unwrap();

        assert_eq!(imported.len(), table.len());
        for (original, copy) in table.iter().zip(imported.iter()) {
            assert_eq!(original, copy);
        }
    }
}

#[test]
fn test_bom_prefixed_group_loads() {
    let root = tempfile::tempdir().unwrap();
    let source = std::fs::read_to_string(ruins_dir().join("RuinPillar_01/materials.cs")).unwrap();
    let dir = root.path().join("RuinPillar_01");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("materials.cs"), format!("\u{feff}{source}")).unwrap();

    let mut library = MaterialLibrary::new(LoaderConfig::default());
    let report = library.load_dir(root.path());
    assert!(report.is_clean(), "failed groups: {:?}", report.failed);
    assert_eq!(library.material_count(), 2);
}
