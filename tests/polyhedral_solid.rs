#![allow(clippy::unwrap_used)]

mod common;

use approx::assert_relative_eq;
use brepkit::math::Point3;
use brepkit::mesh::{
    ElementFacet, HasAdjacency, HasElements, HasVertices, MeshTopologyBuilder, PolyhedralSolid,
};
use brepkit::FormatRegistry;

fn tetrahedron_facets() -> Vec<Vec<usize>> {
    vec![vec![1, 3, 2], vec![0, 2, 3], vec![3, 1, 0], vec![0, 1, 2]]
}

/// A prism and two tetrahedra stacked on its top triangle.
fn stacked_solid() -> PolyhedralSolid {
    let mut solid = PolyhedralSolid::new();
    let mut builder = MeshTopologyBuilder::new(&mut solid);
    for [x, y, z] in [
        [0.1, 0.2, 0.3],
        [2.1, 9.4, 6.7],
        [7.5, 5.2, 6.3],
        [8.1, 1.4, 4.7],
        [4.7, 2.1, 1.3],
        [9.3, 5.3, 6.7],
        [7.5, 4.2, 2.8],
        [2.2, 3.3, 4.4],
    ] {
        builder.create_point(Point3::new(x, y, z));
    }
    builder
        .create_polyhedron(
            &[0, 1, 2, 3, 4, 5],
            &[
                vec![0, 1, 2],
                vec![3, 5, 4],
                vec![0, 3, 4, 1],
                vec![0, 2, 5, 3],
                vec![1, 4, 5, 2],
            ],
        )
        .unwrap();
    builder
        .create_polyhedron(&[3, 4, 5, 6], &tetrahedron_facets())
        .unwrap();
    builder
        .create_polyhedron(&[4, 5, 6, 7], &tetrahedron_facets())
        .unwrap();
    builder.compute_adjacencies().unwrap();
    solid
}

fn adjacent(solid: &PolyhedralSolid, element: usize, facet: usize) -> Option<usize> {
    solid.adjacent(ElementFacet::new(element, facet)).unwrap()
}

#[test]
fn shared_triangles_link_neighbors() {
    let solid = stacked_solid();
    assert_eq!(solid.nb_vertices(), 8);
    assert_eq!(solid.nb_elements(), 3);
    assert_eq!(adjacent(&solid, 0, 0), None);
    assert_eq!(adjacent(&solid, 0, 1), Some(1));
    assert_eq!(adjacent(&solid, 0, 2), None);
    assert_eq!(adjacent(&solid, 1, 0), Some(2));
    assert_eq!(adjacent(&solid, 1, 3), Some(0));
    assert_eq!(adjacent(&solid, 2, 3), Some(1));

    assert_eq!(solid.elements_around_vertex(4).unwrap().len(), 3);
    assert_eq!(solid.facets_on_border(0).unwrap().len(), 4);
}

#[test]
fn deleting_a_vertex_removes_its_polyhedra() {
    let mut solid = stacked_solid();
    let mut builder = MeshTopologyBuilder::new(&mut solid);
    let mut to_delete = vec![false; 8];
    to_delete[0] = true;
    let map = builder.delete_vertices(&to_delete).unwrap();
    assert_eq!(map[0], None);
    assert_eq!(map[7], Some(6));

    assert_eq!(solid.nb_vertices(), 7);
    assert_relative_eq!(*solid.point(0).unwrap(), Point3::new(2.1, 9.4, 6.7));
    assert_eq!(solid.nb_elements(), 2);
    assert_eq!(adjacent(&solid, 1, 3), Some(0));

    MeshTopologyBuilder::new(&mut solid)
        .delete_elements(&[true, false])
        .unwrap();
    assert_eq!(solid.nb_elements(), 1);
    assert_eq!(solid.element_vertices(0).unwrap(), &[3, 4, 5, 6]);
    assert_eq!(solid.facets_on_border(0).unwrap().len(), 4);
}

#[test]
fn barycenters_are_vertex_means() {
    let (a, b, c) = (0.6, 2.4, 1.8);
    let mut solid = PolyhedralSolid::new();
    let mut builder = MeshTopologyBuilder::new(&mut solid);
    for [x, y, z] in [
        [0.0, 0.0, 0.0],
        [a, 0.0, 0.0],
        [0.0, 0.0, c],
        [0.0, b, 0.0],
        [a, b, 0.0],
        [0.0, b, c],
    ] {
        builder.create_point(Point3::new(x, y, z));
    }
    builder
        .create_polyhedron(
            &[0, 1, 2, 3, 4, 5],
            &[
                vec![0, 1, 2],
                vec![0, 1, 4, 3],
                vec![1, 2, 5, 4],
                vec![0, 3, 5, 2],
                vec![3, 4, 5],
            ],
        )
        .unwrap();

    assert_relative_eq!(
        solid.facet_barycenter(ElementFacet::new(0, 0)).unwrap(),
        Point3::new(a / 3.0, 0.0, c / 3.0)
    );
    assert_relative_eq!(
        solid.element_barycenter(0).unwrap(),
        Point3::new(a / 3.0, b / 2.0, c / 3.0)
    );
}

#[test]
fn native_file_keeps_the_adjacencies() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.pso");
    let registry = FormatRegistry::with_native_formats();
    let solid = stacked_solid();

    registry.save_mesh(&solid, &path).unwrap();
    let reloaded: PolyhedralSolid = registry.load_mesh(&path).unwrap();
    assert_eq!(reloaded, solid);
    assert_eq!(adjacent(&reloaded, 2, 3), Some(1));
}
