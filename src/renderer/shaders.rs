use anyhow::{bail, Context, Result};
use ash::vk;

macro_rules! spirv {
    ($name:literal) => {
        include_bytes!(concat!(env!("OUT_DIR"), "/", $name, ".spv"))
    };
}

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Compiled vertex and fragment stages of one pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ShaderPair {
    pub vertex: &'static [u8],
    pub fragment: &'static [u8],
}

pub const MODEL: ShaderPair = ShaderPair {
    vertex: spirv!("model.vert"),
    fragment: spirv!("model.frag"),
};
pub const TERRAIN: ShaderPair = ShaderPair {
    vertex: spirv!("terrain.vert"),
    fragment: spirv!("terrain.frag"),
};
pub const SKYBOX: ShaderPair = ShaderPair {
    vertex: spirv!("skybox.vert"),
    fragment: spirv!("skybox.frag"),
};
pub const PYRAMID: ShaderPair = ShaderPair {
    vertex: spirv!("pyramid.vert"),
    fragment: spirv!("pyramid.frag"),
};
pub const OVERLAY: ShaderPair = ShaderPair {
    vertex: spirv!("overlay.vert"),
    fragment: spirv!("overlay.frag"),
};

/// Reassembles little-endian SPIR-V words. `include_bytes!` gives no
/// alignment guarantee, so the bytes are copied rather than cast.
pub fn spirv_words(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        bail!("SPIR-V length {} is not a multiple of 4", bytes.len());
    }
    let words = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect::<Vec<_>>();
    if words[0] != SPIRV_MAGIC {
        bail!("Bad SPIR-V magic {:#010x}", words[0]);
    }
    Ok(words)
}

pub fn create_shader_module(device: &ash::Device, bytes: &[u8]) -> Result<vk::ShaderModule> {
    let code = spirv_words(bytes)?;
    unsafe { device.create_shader_module(&vk::ShaderModuleCreateInfo::builder().code(&code), None) }
        .context("Failed to create shader module")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_shaders_are_spirv() {
        for pair in [MODEL, TERRAIN, SKYBOX, PYRAMID, OVERLAY] {
            assert!(spirv_words(pair.vertex).is_ok());
            assert!(spirv_words(pair.fragment).is_ok());
        }
    }

    #[test]
    fn rejects_truncated_or_foreign_bytes() {
        assert!(spirv_words(&[]).is_err());
        assert!(spirv_words(&[0x03, 0x02, 0x23]).is_err());
        assert!(spirv_words(&[0, 0, 0, 0]).is_err());
        assert_eq!(
            spirv_words(&[0x03, 0x02, 0x23, 0x07, 1, 0, 0, 0]).unwrap(),
            vec![SPIRV_MAGIC, 1]
        );
    }
}
