use anyhow::{bail, Context, Result};
use glam::{Vec2, Vec3};
use std::path::{Path, PathBuf};

use crate::geometry::MeshVertex;

/// Texture maps named by one MTL material, resolved against the OBJ's
/// directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialMaps {
    pub name: String,
    pub diffuse: Option<PathBuf>,
    pub specular: Option<PathBuf>,
}

/// A run of vertices drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshPart {
    pub first_vertex: u32,
    pub vertex_count: u32,
    /// Index into [`MeshData::materials`].
    pub material: Option<usize>,
}

/// Triangle soup ready for a non-indexed draw, split by material.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub parts: Vec<MeshPart>,
    pub materials: Vec<MaterialMaps>,
}
impl MeshData {
    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }
}

/// Loads every model in an OBJ file into one vertex list, one part per model.
///
/// Missing normals fall back to +Y and missing texture coordinates to zero.
/// A broken or missing MTL file only costs the materials.
pub fn load_obj(path: impl AsRef<Path>) -> Result<MeshData> {
    let path = path.as_ref();
    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ignore_points: true,
            ignore_lines: true,
        },
    )
    .with_context(|| format!("Failed to load OBJ {path:?}"))?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let materials = match materials {
        Ok(materials) => materials
            .iter()
            .map(|material| MaterialMaps {
                name: material.name.clone(),
                diffuse: texture_path(base_dir, material.diffuse_texture.as_deref()),
                specular: texture_path(base_dir, material.specular_texture.as_deref()),
            })
            .collect::<Vec<_>>(),
        Err(err) => {
            log::warn!("No materials for {path:?}: {err}");
            vec![]
        }
    };

    let mut vertices = vec![];
    let mut parts = vec![];
    for model in &models {
        let mesh = &model.mesh;
        let has_normals = mesh.normals.len() == mesh.positions.len();
        let has_tex_coords = mesh.texcoords.len() / 2 == mesh.positions.len() / 3;
        let first_vertex = vertices.len() as u32;

        for &index in &mesh.indices {
            let i = index as usize;
            let position = Vec3::new(
                mesh.positions[3 * i],
                mesh.positions[3 * i + 1],
                mesh.positions[3 * i + 2],
            );
            let normal = if has_normals {
                Vec3::new(
                    mesh.normals[3 * i],
                    mesh.normals[3 * i + 1],
                    mesh.normals[3 * i + 2],
                )
            } else {
                Vec3::Y
            };
            let tex_coords = if has_tex_coords {
                Vec2::new(mesh.texcoords[2 * i], mesh.texcoords[2 * i + 1])
            } else {
                Vec2::ZERO
            };
            vertices.push(MeshVertex {
                position,
                normal,
                tex_coords,
            });
        }

        let vertex_count = vertices.len() as u32 - first_vertex;
        if vertex_count == 0 {
            continue;
        }
        let material = mesh.material_id.filter(|&id| {
            let known = id < materials.len();
            if !known {
                log::warn!("{:?} in {path:?} names unknown material {id}", model.name);
            }
            known
        });
        parts.push(MeshPart {
            first_vertex,
            vertex_count,
            material,
        });
    }

    if vertices.is_empty() {
        bail!("OBJ {path:?} contains no triangles");
    }
    log::debug!(
        "Loaded {} vertices in {} part(s) with {} material(s) from {path:?}",
        vertices.len(),
        parts.len(),
        materials.len()
    );

    Ok(MeshData {
        vertices,
        parts,
        materials,
    })
}

fn texture_path(base_dir: &Path, name: Option<&str>) -> Option<PathBuf> {
    let name = name.map(str::trim).filter(|name| !name.is_empty())?;
    Some(base_dir.join(name.replace('\\', "/")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_obj(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("house-scene-mesh-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn quad_is_triangulated() {
        let path = write_obj(
            "quad.obj",
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
             vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n\
             vn 0 0 1\n\
             f 1/1/1 2/2/1 3/3/1 4/4/1\n",
        );
        let mesh = load_obj(&path).unwrap();

        assert_eq!(mesh.vertex_count(), 6);
        assert!(mesh.vertices.iter().all(|v| v.normal == Vec3::Z));
        assert_eq!(mesh.vertices[0].position, Vec3::ZERO);
        assert!(mesh
            .vertices
            .iter()
            .any(|v| v.position == Vec3::new(1.0, 1.0, 0.0) && v.tex_coords == Vec2::ONE));
    }

    #[test]
    fn missing_attributes_get_defaults() {
        let path = write_obj("bare.obj", "v 0 0 0\nv 1 0 0\nv 0 0 1\nf 1 2 3\n");
        let mesh = load_obj(&path).unwrap();

        assert_eq!(mesh.vertex_count(), 3);
        assert!(mesh.vertices.iter().all(|v| v.normal == Vec3::Y));
        assert!(mesh.vertices.iter().all(|v| v.tex_coords == Vec2::ZERO));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_obj("/definitely/not/here.obj").unwrap_err();
        assert!(format!("{err:#}").contains("here.obj"));
    }

    #[test]
    fn empty_file_is_an_error() {
        let path = write_obj("empty.obj", "# nothing\n");
        assert!(load_obj(&path).is_err());
    }

    #[test]
    fn materials_split_parts_and_resolve_maps() {
        write_obj(
            "two_parts.mtl",
            "newmtl wood\nmap_Kd textures/wood.png\nmap_Ks textures/wood_spec.png\n\
             newmtl glass\nKd 0.5 0.5 0.5\n",
        );
        let path = write_obj(
            "two_parts.obj",
            "mtllib two_parts.mtl\n\
             v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
             o walls\nusemtl wood\nf 1 2 3 4\n\
             o window\nusemtl glass\nf 1 2 3\n",
        );
        let mesh = load_obj(&path).unwrap();
        let dir = path.parent().unwrap();

        assert_eq!(mesh.materials.len(), 2);
        let wood = mesh.materials.iter().position(|m| m.name == "wood").unwrap();
        let glass = mesh.materials.iter().position(|m| m.name == "glass").unwrap();
        assert_eq!(
            mesh.materials[wood].diffuse.as_deref(),
            Some(dir.join("textures/wood.png").as_path())
        );
        assert_eq!(
            mesh.materials[wood].specular.as_deref(),
            Some(dir.join("textures/wood_spec.png").as_path())
        );
        assert_eq!(mesh.materials[glass].diffuse, None);

        assert_eq!(
            mesh.parts,
            [
                MeshPart {
                    first_vertex: 0,
                    vertex_count: 6,
                    material: Some(wood),
                },
                MeshPart {
                    first_vertex: 6,
                    vertex_count: 3,
                    material: Some(glass),
                },
            ]
        );
        assert_eq!(mesh.vertex_count(), 9);
    }

    #[test]
    fn missing_mtl_keeps_the_geometry() {
        let path = write_obj(
            "no_mtl.obj",
            "mtllib not_there.mtl\nv 0 0 0\nv 1 0 0\nv 0 0 1\nusemtl ghost\nf 1 2 3\n",
        );
        let mesh = load_obj(&path).unwrap();
        assert!(mesh.materials.is_empty());
        assert_eq!(mesh.parts.len(), 1);
        assert_eq!(mesh.parts[0].material, None);
        assert_eq!(mesh.parts[0].vertex_count, 3);
    }
}
