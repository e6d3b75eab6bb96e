use anyhow::{anyhow, Context, Result};
use naga::{
    back::spv,
    front::glsl,
    valid::{Capabilities, ValidationFlags, Validator},
    ShaderStage,
};
use std::{env, fs, path::PathBuf};

const SHADERS: &[(&str, ShaderStage)] = &[
    ("model.vert", ShaderStage::Vertex),
    ("model.frag", ShaderStage::Fragment),
    ("terrain.vert", ShaderStage::Vertex),
    ("terrain.frag", ShaderStage::Fragment),
    ("skybox.vert", ShaderStage::Vertex),
    ("skybox.frag", ShaderStage::Fragment),
    ("pyramid.vert", ShaderStage::Vertex),
    ("pyramid.frag", ShaderStage::Fragment),
    ("overlay.vert", ShaderStage::Vertex),
    ("overlay.frag", ShaderStage::Fragment),
];

// naga's GLSL frontend has no include support, so the shared uniform block is spliced in here.
const SCENE_INCLUDE: &str = "#include \"scene.glsl\"";

fn main() -> Result<()> {
    let shader_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?).join("shaders");
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    println!("cargo:rerun-if-changed=shaders");

    let scene_block = fs::read_to_string(shader_dir.join("scene.glsl"))
        .context("Failed to read shaders/scene.glsl")?;

    for &(name, stage) in SHADERS {
        let source = fs::read_to_string(shader_dir.join(name))
            .with_context(|| format!("Failed to read shaders/{name}"))?;
        let source = source.replace(SCENE_INCLUDE, &scene_block);
        let words = compile(name, &source, stage)?;
        let bytes = words
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect::<Vec<u8>>();
        fs::write(out_dir.join(format!("{name}.spv")), bytes)
            .with_context(|| format!("Failed to write {name}.spv"))?;
    }

    Ok(())
}

fn compile(name: &str, source: &str, stage: ShaderStage) -> Result<Vec<u32>> {
    let module = glsl::Frontend::default()
        .parse(&glsl::Options::from(stage), source)
        .map_err(|err| anyhow!("{name} failed to parse: {err:?}"))?;
    let info = Validator::new(ValidationFlags::all(), Capabilities::PUSH_CONSTANT)
        .validate(&module)
        .map_err(|err| anyhow!("{name} failed validation: {err:?}"))?;

    // The projection matrices already flip Y for Vulkan.
    let mut options = spv::Options::default();
    options
        .flags
        .remove(spv::WriterFlags::ADJUST_COORDINATE_SPACE);

    spv::write_vec(&module, &info, &options, None)
        .map_err(|err| anyhow!("{name} failed to emit SPIR-V: {err:?}"))
}
