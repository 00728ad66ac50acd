#![allow(clippy::unwrap_used)]

mod common;

use std::fs;
use std::path::Path;

use brepkit::error::{FormatError, ModelError};
use brepkit::math::Point3;
use brepkit::mesh::PointSet;
use brepkit::model::{Corner, Line, Surface};
use brepkit::{
    BrepError, ComponentId, ComponentType, ComponentVertex, FormatRegistry, Model, ModelBuilder,
    SaveParams,
};
use uuid::Uuid;

const CORNER_LINES: [(usize, usize); 12] = [
    (0, 0),
    (0, 1),
    (1, 0),
    (1, 2),
    (1, 3),
    (2, 1),
    (2, 2),
    (2, 4),
    (3, 3),
    (3, 5),
    (4, 4),
    (4, 5),
];
const LINE_SURFACES: [(usize, usize); 7] = [(0, 0), (1, 0), (2, 0), (2, 1), (3, 1), (4, 1), (5, 1)];
const CORNER_POINTS: [[f64; 3]; 5] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.5, 1.5, 0.0],
];

struct House {
    model: Model,
    corners: Vec<Uuid>,
    lines: Vec<Uuid>,
    surfaces: Vec<Uuid>,
}

/// The section of a house: a square wall and a roof sharing line 2,
/// meshed with one vertex per corner and one edge per line.
fn house() -> House {
    let mut model = Model::new();
    let mut builder = ModelBuilder::new(&mut model);
    builder.set_model_name("house");
    let corners: Vec<Uuid> = (0..5).map(|_| builder.add_corner().unwrap()).collect();
    let lines: Vec<Uuid> = (0..6).map(|_| builder.add_line().unwrap()).collect();
    let surfaces: Vec<Uuid> = (0..2).map(|_| builder.add_surface().unwrap()).collect();
    for (i, id) in lines.iter().enumerate() {
        builder
            .set_component_name::<Line>(id, format!("line{i}"))
            .unwrap();
    }

    for (corner, [x, y, z]) in corners.iter().zip(CORNER_POINTS) {
        builder
            .corner_mesh_builder(corner)
            .unwrap()
            .create_point(Point3::new(x, y, z));
        let unique = builder.create_unique_vertex();
        builder
            .set_unique_vertex(
                ComponentVertex::new(ComponentId::new(ComponentType::Corner, *corner), 0),
                unique,
            )
            .unwrap();
    }
    let mut line_ends = vec![Vec::new(); lines.len()];
    for (c, l) in CORNER_LINES {
        builder.add_boundary_relation(&corners[c], &lines[l]).unwrap();
        line_ends[l].push(c);
    }
    for (l, ends) in line_ends.iter().enumerate() {
        let mut mesh = builder.line_mesh_builder(&lines[l]).unwrap();
        for &c in ends {
            let [x, y, z] = CORNER_POINTS[c];
            mesh.create_point(Point3::new(x, y, z));
        }
        mesh.create_element(&[0, 1]).unwrap();
        for (vertex, &c) in ends.iter().enumerate() {
            builder
                .set_unique_vertex(
                    ComponentVertex::new(ComponentId::new(ComponentType::Line, lines[l]), vertex),
                    c,
                )
                .unwrap();
        }
    }
    for (l, s) in LINE_SURFACES {
        builder.add_boundary_relation(&lines[l], &surfaces[s]).unwrap();
    }
    House {
        model,
        corners,
        lines,
        surfaces,
    }
}

fn save(model: &Model, dir: &Path) -> std::path::PathBuf {
    let path = dir.join("house.brep");
    FormatRegistry::with_native_formats()
        .save_model(model, &path, &SaveParams::default())
        .unwrap();
    path
}

#[test]
fn house_topology() {
    let house = house();
    let model = &house.model;
    assert_eq!(model.nb_corners(), 5);
    assert_eq!(model.nb_lines(), 6);
    assert_eq!(model.nb_surfaces(), 2);
    assert_eq!(model.relationships().nb_relations(), 19);
    assert_eq!(model.incidences(&house.corners[1]).unwrap().count(), 3);
    assert_eq!(model.boundaries(&house.surfaces[1]).unwrap().count(), 4);
    assert_eq!(model.incidences(&house.lines[2]).unwrap().count(), 2);

    assert_eq!(model.nb_unique_vertices(), 5);
    let around_corner_1: Vec<_> = model
        .component_mesh_vertices(1, Some(ComponentType::Line))
        .unwrap()
        .collect();
    assert_eq!(around_corner_1.len(), 3);
}

#[test]
fn reload_restores_everything() {
    common::init_tracing();
    let house = house();
    let dir = tempfile::tempdir().unwrap();
    let path = save(&house.model, dir.path());
    let reloaded = FormatRegistry::with_native_formats()
        .load_model(&path)
        .unwrap();

    assert_eq!(reloaded.id(), house.model.id());
    assert_eq!(reloaded.name(), "house");
    assert_eq!(reloaded.line(&house.lines[3]).unwrap().name(), "line3");
    assert_eq!(
        reloaded.line_mesh(&house.lines[5]).unwrap(),
        house.model.line_mesh(&house.lines[5]).unwrap()
    );
    for id in house.corners.iter().chain(&house.lines).chain(&house.surfaces) {
        assert_eq!(
            reloaded.relationships().count_boundaries(id).unwrap(),
            house.model.relationships().count_boundaries(id).unwrap()
        );
        assert_eq!(
            reloaded.relationships().count_incidences(id).unwrap(),
            house.model.relationships().count_incidences(id).unwrap()
        );
    }
    let line4 = ComponentId::new(ComponentType::Line, house.lines[4]);
    assert_eq!(
        reloaded.unique_vertex(ComponentVertex::new(line4, 1)).unwrap(),
        Some(4)
    );
}

#[test]
fn unknown_extension_is_unsupported() {
    let house = house();
    let dir = tempfile::tempdir().unwrap();
    let registry = FormatRegistry::with_native_formats();
    let err = registry
        .save_model(&house.model, dir.path().join("house.step"), &SaveParams::default())
        .unwrap_err();
    assert!(matches!(
        err,
        BrepError::Format(FormatError::UnsupportedFormat(_))
    ));
    assert!(matches!(
        registry.load_model(dir.path().join("house")),
        Err(BrepError::Format(FormatError::UnsupportedFormat(_)))
    ));
}

#[test]
fn damaged_files_are_corrupt() {
    common::init_tracing();
    let house = house();
    let dir = tempfile::tempdir().unwrap();
    let path = save(&house.model, dir.path());
    let registry = FormatRegistry::with_native_formats();

    let relationships = path.join("relationships");
    let mut bytes = fs::read(&relationships).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&relationships, &bytes).unwrap();
    assert!(matches!(
        registry.load_model(&path),
        Err(BrepError::Format(FormatError::CorruptData(_)))
    ));

    let path = save(&house.model, dir.path());
    let unique_vertices = path.join("unique_vertices");
    let bytes = fs::read(&unique_vertices).unwrap();
    fs::write(&unique_vertices, &bytes[..bytes.len() / 2]).unwrap();
    assert!(matches!(
        registry.load_model(&path),
        Err(BrepError::Format(FormatError::CorruptData(_)))
    ));
}

#[test]
fn removing_a_line_detaches_it() {
    let mut house = house();
    let line2 = house.lines[2];
    let mut builder = ModelBuilder::new(&mut house.model);
    builder.remove_line(&line2).unwrap();
    assert!(matches!(
        builder.remove_component::<Surface>(&line2),
        Err(BrepError::Model(ModelError::NotFound(_)))
    ));

    let model = &house.model;
    assert_eq!(model.nb_lines(), 5);
    assert_eq!(model.incidences(&house.corners[1]).unwrap().count(), 2);
    assert_eq!(model.boundaries(&house.surfaces[0]).unwrap().count(), 2);
    assert_eq!(
        model
            .component_mesh_vertices(1, Some(ComponentType::Line))
            .unwrap()
            .count(),
        2
    );
}

#[test]
fn unique_vertices_follow_corner_deletion() {
    let mut house = house();
    let corner = house.corners[4];
    let mut builder = ModelBuilder::new(&mut house.model);
    builder.create_vertices::<Corner>(&corner, 2).unwrap();
    let map = builder
        .delete_vertices::<Corner>(&corner, &[true, false, false])
        .unwrap();
    assert_eq!(map, vec![None, Some(0), Some(1)]);

    let model = &house.model;
    let members: Vec<_> = model.component_mesh_vertices(4, None).unwrap().collect();
    assert_eq!(members.len(), 2);
    assert!(members
        .iter()
        .all(|cv| cv.component.component_type == ComponentType::Line));
    let id = ComponentId::new(ComponentType::Corner, corner);
    assert_eq!(model.unique_vertex(ComponentVertex::new(id, 0)).unwrap(), None);
}

#[test]
fn stale_unique_vertices_are_not_saved() {
    let mut house = house();
    let corner = house.corners[0];
    let mut builder = ModelBuilder::new(&mut house.model);
    let mut mesh = builder.corner_mesh_builder(&corner).unwrap();
    mesh.delete_vertices(&[true]).unwrap();
    mesh.create_vertex();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("house.brep");
    let err = FormatRegistry::with_native_formats()
        .save_model(&house.model, &path, &SaveParams::default())
        .unwrap_err();
    assert!(matches!(
        err,
        BrepError::Model(ModelError::InvariantViolation(_))
    ));
    assert!(!path.exists());
}

#[test]
fn mesh_file_behind_the_unique_vertices_is_corrupt() {
    common::init_tracing();
    let house = house();
    let dir = tempfile::tempdir().unwrap();
    let path = save(&house.model, dir.path());
    let registry = FormatRegistry::with_native_formats();
    let corner = house.corners[0];
    registry
        .save_mesh(&PointSet::new(), path.join(format!("Corner{corner}.pts")))
        .unwrap();
    assert!(matches!(
        registry.load_model(&path),
        Err(BrepError::Format(FormatError::CorruptData(_)))
    ));
}
