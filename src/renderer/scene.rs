use anyhow::{bail, Result};
use ash::vk;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use super::{
    buffer::VertexBuffer,
    context::VulkanContext,
    descriptors,
    image::{create_sampler, GpuImage, SamplerKind},
};
use crate::{
    config::AssetPaths,
    geometry::{PYRAMID_VERTICES, SKYBOX_VERTICES, TERRAIN_VERTICES},
    mesh::{self, MaterialMaps, MeshData, MeshPart},
    texture::{self, CubemapData, TextureData},
};

/// Stand-in for a 2D texture that failed to load.
pub const FALLBACK_TEXTURE: [u8; 4] = [128, 128, 128, 255];
/// Stand-in for every face of a skybox that failed to load.
pub const FALLBACK_SKYBOX: [u8; 4] = [0, 0, 0, 255];
/// Specular map for materials that name none; keeps full highlights.
pub const DEFAULT_SPECULAR: [u8; 4] = [255, 255, 255, 255];

/// Texture slots of one house material, as indices into
/// [`HouseTextures::textures`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HouseMaterial {
    pub diffuse: usize,
    pub specular: usize,
}

/// Decoded house textures shared between materials.
///
/// Texture 0 is the configured diffuse map and texture 1 a white specular
/// map. Material 0 pairs the two and serves parts without a material of
/// their own; OBJ material `i` becomes material `i + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct HouseTextures {
    pub textures: Vec<TextureData>,
    pub materials: Vec<HouseMaterial>,
}

impl HouseTextures {
    const DEFAULT_MATERIAL: HouseMaterial = HouseMaterial {
        diffuse: 0,
        specular: 1,
    };

    /// Decodes every map the materials name, once per path. A map that is
    /// missing or fails to decode falls back to the default slot.
    pub fn resolve(
        default_diffuse: TextureData,
        maps: &[MaterialMaps],
        mut decode: impl FnMut(&Path) -> Result<TextureData>,
    ) -> Self {
        let mut textures = vec![default_diffuse, TextureData::solid(DEFAULT_SPECULAR)];
        let mut loaded = HashMap::<PathBuf, Option<usize>>::new();
        let mut slot = |path: Option<&PathBuf>, fallback: usize| {
            let Some(path) = path else {
                return fallback;
            };
            let index = *loaded.entry(path.clone()).or_insert_with(|| match decode(path) {
                Ok(texture) => {
                    textures.push(texture);
                    Some(textures.len() - 1)
                }
                Err(err) => {
                    log::error!("{err:#}; using the default house map");
                    None
                }
            });
            index.unwrap_or(fallback)
        };

        let mut materials = vec![Self::DEFAULT_MATERIAL];
        for maps in maps {
            materials.push(HouseMaterial {
                diffuse: slot(maps.diffuse.as_ref(), Self::DEFAULT_MATERIAL.diffuse),
                specular: slot(maps.specular.as_ref(), Self::DEFAULT_MATERIAL.specular),
            });
        }
        Self {
            textures,
            materials,
        }
    }

    /// Material used to draw `part`.
    pub fn material_index(part: &MeshPart) -> usize {
        part.material.map_or(0, |material| material + 1)
    }
}

/// Everything decoded from disk before the GPU is involved.
///
/// Loading never fails as a whole: each broken asset is logged and replaced.
/// A missing house model means the house is not drawn.
pub struct SceneAssets {
    pub house: Option<MeshData>,
    pub house_textures: HouseTextures,
    /// Base color, height and roughness.
    pub terrain: [TextureData; 3],
    pub skybox: CubemapData,
}

impl SceneAssets {
    pub fn load(paths: &AssetPaths) -> Self {
        let house = match mesh::load_obj(&paths.house_model) {
            Ok(mesh) => {
                log::info!(
                    "House model: {} vertices, {} materials",
                    mesh.vertex_count(),
                    mesh.materials.len()
                );
                Some(mesh)
            }
            Err(err) => {
                log::error!("{err:#}; the house will not be drawn");
                None
            }
        };
        let house_textures = HouseTextures::resolve(
            texture_or_fallback(&paths.house_texture),
            house.as_ref().map_or(&[][..], |house| house.materials.as_slice()),
            |path| texture::decode_2d(path),
        );
        let skybox = match texture::decode_cubemap(&paths.skybox) {
            Ok(skybox) => skybox,
            Err(err) => {
                log::error!("{err:#}; using a black skybox");
                CubemapData::solid(FALLBACK_SKYBOX)
            }
        };

        Self {
            house,
            house_textures,
            terrain: [
                texture_or_fallback(&paths.terrain_base),
                texture_or_fallback(&paths.terrain_height),
                texture_or_fallback(&paths.terrain_roughness),
            ],
            skybox,
        }
    }

    /// Descriptors the scene textures take from the shared pool.
    pub fn descriptor_demand(&self) -> DescriptorDemand {
        let materials = self.house_textures.materials.len() as u32;
        // terrain and skybox, then one set per house material
        DescriptorDemand {
            sets: 2 + materials,
            images: 3 + 1 + 2 * materials,
            samplers: 2 + materials,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorDemand {
    pub sets: u32,
    pub images: u32,
    pub samplers: u32,
}

fn texture_or_fallback(path: &Path) -> TextureData {
    texture::decode_2d(path).unwrap_or_else(|err| {
        log::error!("{err:#}; using a flat grey texture");
        TextureData::solid(FALLBACK_TEXTURE)
    })
}

/// Scene geometry in the order it is uploaded; the house comes last because
/// it may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneMesh {
    Terrain,
    Skybox,
    Pyramid,
    House,
}

/// Descriptor set layouts the scene textures are written against.
#[derive(Debug, Clone, Copy)]
pub struct TextureLayouts {
    /// One image and a sampler: skybox.
    pub single: vk::DescriptorSetLayout,
    /// Diffuse and specular maps and a sampler: house materials.
    pub material: vk::DescriptorSetLayout,
    /// Three images and a sampler: terrain.
    pub terrain: vk::DescriptorSetLayout,
}

/// GPU copies of the scene assets plus their descriptor sets.
pub struct SceneResources {
    meshes: Vec<VertexBuffer>,
    images: Vec<GpuImage>,
    samplers: Vec<vk::Sampler>,
    house_parts: Vec<MeshPart>,
    house_sets: Vec<vk::DescriptorSet>,
    pub terrain_set: vk::DescriptorSet,
    pub skybox_set: vk::DescriptorSet,
}

impl SceneResources {
    pub fn new(
        ctx: &VulkanContext,
        assets: &SceneAssets,
        pool: vk::DescriptorPool,
        layouts: TextureLayouts,
    ) -> Result<Self> {
        let mut resources = Self {
            meshes: vec![],
            images: vec![],
            samplers: vec![],
            house_parts: vec![],
            house_sets: vec![],
            terrain_set: vk::DescriptorSet::null(),
            skybox_set: vk::DescriptorSet::null(),
        };
        if let Err(err) = resources.upload(ctx, assets, pool, layouts) {
            resources.destroy(ctx);
            return Err(err);
        }
        Ok(resources)
    }

    fn upload(
        &mut self,
        ctx: &VulkanContext,
        assets: &SceneAssets,
        pool: vk::DescriptorPool,
        layouts: TextureLayouts,
    ) -> Result<()> {
        self.meshes
            .push(VertexBuffer::new(ctx, "terrain vertices", &TERRAIN_VERTICES)?);
        self.meshes
            .push(VertexBuffer::new(ctx, "skybox vertices", &SKYBOX_VERTICES)?);
        self.meshes
            .push(VertexBuffer::new(ctx, "pyramid vertices", &PYRAMID_VERTICES)?);
        if let Some(house) = &assets.house {
            self.meshes
                .push(VertexBuffer::new(ctx, "house vertices", &house.vertices)?);
            self.house_parts = house.parts.clone();
        }

        let repeat = create_sampler(&ctx.device, SamplerKind::RepeatMipmapped)?;
        self.samplers.push(repeat);
        let clamp = create_sampler(&ctx.device, SamplerKind::ClampLinear)?;
        self.samplers.push(clamp);

        let mut house_views = vec![];
        for (i, texture) in assets.house_textures.textures.iter().enumerate() {
            let name = format!("house texture {i}");
            house_views.push(self.push_image(GpuImage::texture_2d(ctx, &name, texture)?));
        }
        let mut terrain_views = [vk::ImageView::null(); 3];
        for (view, (texture, name)) in terrain_views.iter_mut().zip(
            assets
                .terrain
                .iter()
                .zip(["terrain base", "terrain height", "terrain roughness"]),
        ) {
            *view = self.push_image(GpuImage::texture_2d(ctx, name, texture)?);
        }
        let skybox = self.push_image(GpuImage::cubemap(ctx, "skybox", &assets.skybox)?);

        let sets =
            descriptors::allocate_sets(&ctx.device, pool, &[layouts.terrain, layouts.single])?;
        let &[terrain_set, skybox_set] = sets.as_slice() else {
            bail!("Expected 2 texture descriptor sets, got {}", sets.len());
        };
        descriptors::write_texture_set(&ctx.device, terrain_set, &terrain_views, repeat);
        descriptors::write_texture_set(&ctx.device, skybox_set, &[skybox], clamp);
        self.terrain_set = terrain_set;
        self.skybox_set = skybox_set;

        let materials = &assets.house_textures.materials;
        let material_layouts = vec![layouts.material; materials.len()];
        self.house_sets = descriptors::allocate_sets(&ctx.device, pool, &material_layouts)?;
        for (&set, material) in self.house_sets.iter().zip(materials) {
            descriptors::write_texture_set(
                &ctx.device,
                set,
                &[house_views[material.diffuse], house_views[material.specular]],
                repeat,
            );
        }

        Ok(())
    }

    fn push_image(&mut self, image: GpuImage) -> vk::ImageView {
        let view = image.view;
        self.images.push(image);
        view
    }

    pub fn mesh(&self, mesh: SceneMesh) -> Option<&VertexBuffer> {
        self.meshes.get(mesh as usize)
    }

    /// House parts paired with their material's descriptor set.
    pub fn house_parts(&self) -> impl Iterator<Item = (&MeshPart, vk::DescriptorSet)> {
        self.house_parts.iter().filter_map(|part| {
            let set = self.house_sets.get(HouseTextures::material_index(part))?;
            Some((part, *set))
        })
    }

    /// Descriptor sets are returned with their pool.
    pub fn destroy(&mut self, ctx: &VulkanContext) {
        for mut mesh in self.meshes.drain(..) {
            mesh.destroy(ctx);
        }
        for mut image in self.images.drain(..) {
            image.destroy(ctx);
        }
        for sampler in self.samplers.drain(..) {
            unsafe { ctx.device.destroy_sampler(sampler, None) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::CubemapFaces;
    use std::path::PathBuf;

    fn missing_assets() -> AssetPaths {
        let root = PathBuf::from("/nonexistent/house-scene");
        AssetPaths {
            house_model: root.join("house.obj"),
            house_texture: root.join("house.png"),
            terrain_base: root.join("base.jpg"),
            terrain_height: root.join("height.png"),
            terrain_roughness: root.join("roughness.jpg"),
            skybox: CubemapFaces::from_dir(root.join("skybox"), "png"),
        }
    }

    #[test]
    fn broken_assets_fall_back() {
        let assets = SceneAssets::load(&missing_assets());
        assert!(assets.house.is_none());
        assert_eq!(
            assets.house_textures.textures,
            [
                TextureData::solid(FALLBACK_TEXTURE),
                TextureData::solid(DEFAULT_SPECULAR)
            ]
        );
        assert_eq!(assets.house_textures.materials.len(), 1);
        assert_eq!(
            assets.descriptor_demand(),
            DescriptorDemand {
                sets: 3,
                images: 6,
                samplers: 3,
            }
        );
        assert!(assets
            .terrain
            .iter()
            .all(|texture| texture.pixels == FALLBACK_TEXTURE));
        assert_eq!(assets.skybox, CubemapData::solid(FALLBACK_SKYBOX));
    }

    #[test]
    fn house_is_the_optional_last_mesh() {
        assert_eq!(SceneMesh::Terrain as usize, 0);
        assert_eq!(SceneMesh::House as usize, 3);
    }

    fn maps(name: &str, diffuse: Option<&str>, specular: Option<&str>) -> MaterialMaps {
        MaterialMaps {
            name: name.to_owned(),
            diffuse: diffuse.map(PathBuf::from),
            specular: specular.map(PathBuf::from),
        }
    }

    #[test]
    fn materials_share_decoded_maps_and_fall_back() {
        let mut decoded = vec![];
        let textures = HouseTextures::resolve(
            TextureData::solid([1, 2, 3, 255]),
            &[
                maps("walls", Some("wood.png"), Some("wood_spec.png")),
                maps("roof", Some("wood.png"), None),
                maps("glass", None, Some("broken.png")),
            ],
            |path| {
                decoded.push(path.to_owned());
                if path.ends_with("broken.png") {
                    anyhow::bail!("bad map");
                }
                Ok(TextureData::solid([9, 9, 9, 255]))
            },
        );

        assert_eq!(
            decoded,
            [
                PathBuf::from("wood.png"),
                PathBuf::from("wood_spec.png"),
                PathBuf::from("broken.png")
            ]
        );
        assert_eq!(textures.textures.len(), 4);
        assert_eq!(textures.textures[0], TextureData::solid([1, 2, 3, 255]));
        assert_eq!(
            textures.materials,
            [
                HouseMaterial {
                    diffuse: 0,
                    specular: 1
                },
                HouseMaterial {
                    diffuse: 2,
                    specular: 3
                },
                HouseMaterial {
                    diffuse: 2,
                    specular: 1
                },
                HouseMaterial {
                    diffuse: 0,
                    specular: 1
                },
            ]
        );
    }

    #[test]
    fn parts_without_material_use_the_configured_map() {
        let part = |material| MeshPart {
            first_vertex: 0,
            vertex_count: 3,
            material,
        };
        assert_eq!(HouseTextures::material_index(&part(None)), 0);
        assert_eq!(HouseTextures::material_index(&part(Some(0))), 1);
        assert_eq!(HouseTextures::material_index(&part(Some(4))), 5);
    }
}
