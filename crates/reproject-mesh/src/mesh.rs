/// A triangulated approximation of a reprojection, ready to upload to the GPU.
#[derive(Debug, Clone, Default)]
pub struct ReprojectorMesh {
    /// Flattened `[x, y, z]` triples in the output CRS (z is always 0.0; kept for the GPU's
    /// benefit since vertex buffers are conventionally vec3).
    pub positions: Vec<f32>,
    /// Flattened `[u, v]` pairs, normalized pixel coordinates into the source raster in `[0,1]`.
    pub uvs: Vec<f32>,
    /// Triangle indices into `positions`/`uvs`, three per triangle.
    pub indices: Vec<u32>,
}

impl ReprojectorMesh {
    pub fn vertex_count(&self) -> usize {
        self.uvs.len() / 2
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}
