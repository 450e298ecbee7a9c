//! Adaptive triangular mesh refinement bounding reprojection error.
//!
//! This is a from-scratch implementation of Delatin/martini-style adaptive terrain
//! triangulation (see `DESIGN.md` for its grounding notes), following the rest of this
//! workspace's error-handling and module idiom (`thiserror` enum, `log::trace!` at refinement
//! steps).
//!
//! Start from the two triangles covering the source raster's pixel rectangle. For each
//! triangle, sample a handful of barycentric candidate points spanning both its edge midpoints
//! and its interior, compare each candidate's true reprojected position against the triangle's
//! linear (barycentric) interpolation, and insert whichever candidate deviates most — not
//! necessarily the longest edge's midpoint — once that worst deviation exceeds `max_error`
//! output pixels. An edge-midpoint candidate splits the triangle in two around the shared edge;
//! an interior candidate fans it into three. Candidate points whose forward conversion is
//! undefined (non-invertible CRS, out of the projection's domain) are evicted from
//! consideration rather than subdivided through, since no error bound can be computed for them.
//!
//! Known simplification: neighbouring triangles split independently, so the mesh is not
//! guaranteed crack-free at a T-junction between a refined and an unrefined triangle. A
//! restricted-quadtree edge-balancing pass would close that gap; it is not implemented here.

use raster_affine::Affine;

use crate::error::{MeshError, Result};
use crate::mesh::ReprojectorMesh;

/// Converts a point in the source raster's CRS to the target CRS, returning `None` when the
/// conversion is undefined there (outside the projection's domain, or numerically degenerate).
pub trait CrsConverter {
    fn convert(&self, x: f64, y: f64) -> Option<(f64, f64)>;
}

impl<F: Fn(f64, f64) -> Option<(f64, f64)>> CrsConverter for F {
    fn convert(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        self(x, y)
    }
}

#[derive(Clone, Copy)]
pub struct MesherOptions {
    /// Maximum allowed deviation, in output-raster pixels, between the mesh's linear
    /// interpolation and the true reprojection at any sampled point.
    pub max_error: f64,
    /// Hard recursion cap so a pathological (e.g. near the antimeridian, or where the CRS
    /// converter is discontinuous) region cannot refine forever.
    pub max_depth: u32,
}

impl Default for MesherOptions {
    fn default() -> Self {
        MesherOptions { max_error: 0.5, max_depth: 12 }
    }
}

#[derive(Clone, Copy)]
struct Vertex {
    px: f64,
    py: f64,
    /// `None` when this vertex's forward conversion is undefined; such vertices are never
    /// subdivided through (candidate eviction).
    output: Option<(f64, f64)>,
}

struct MeshBuilder<'a> {
    pixel_to_input_crs: &'a Affine,
    converter: &'a dyn CrsConverter,
    output_to_pixel: &'a Affine,
    options: MesherOptions,
    vertices: Vec<Vertex>,
    triangles: Vec<[u32; 3]>,
}

impl<'a> MeshBuilder<'a> {
    fn make_vertex(&mut self, px: f64, py: f64) -> u32 {
        let (ix, iy) = self.pixel_to_input_crs.forward(px, py);
        let output = self.converter.convert(ix, iy).map(|(ox, oy)| {
            let (opx, opy) = self.output_to_pixel.forward(ox, oy);
            (opx, opy)
        });
        self.vertices.push(Vertex { px, py, output });
        (self.vertices.len() - 1) as u32
    }

    fn split(&mut self, a: u32, b: u32, c: u32, depth: u32) {
        if depth >= self.options.max_depth {
            self.triangles.push([a, b, c]);
            return;
        }

        let va = self.vertices[a as usize];
        let vb = self.vertices[b as usize];
        let vc = self.vertices[c as usize];

        let (oa, ob, oc) = match (va.output, vb.output, vc.output) {
            (Some(oa), Some(ob), Some(oc)) => (oa, ob, oc),
            // A corner is outside the projection's domain: evict this triangle rather than
            // subdividing around an undefined point.
            _ => {
                self.triangles.push([a, b, c]);
                return;
            }
        };

        // Barycentric (u, v, w) candidates spanning the triangle's three edge midpoints and
        // three interior points, searched for the one with the largest reprojection error
        // rather than assuming it falls on the longest edge.
        let candidates = [(0.5, 0.5, 0.0), (0.0, 0.5, 0.5), (0.5, 0.0, 0.5), (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0), (0.5, 0.25, 0.25), (0.25, 0.5, 0.25)];

        let mut worst: Option<(f64, f64, f64, f64, f64, f64)> = None; // (error, px, py, u, v, w)
        for (u, v, w) in candidates {
            let px = u * va.px + v * vb.px + w * vc.px;
            let py = u * va.py + v * vb.py + w * vc.py;
            let (ix, iy) = self.pixel_to_input_crs.forward(px, py);
            let Some((ox, oy)) = self.converter.convert(ix, iy) else { continue };
            let (opx, opy) = self.output_to_pixel.forward(ox, oy);
            let interp_x = u * oa.0 + v * ob.0 + w * oc.0;
            let interp_y = u * oa.1 + v * ob.1 + w * oc.1;
            let dx = opx - interp_x;
            let dy = opy - interp_y;
            let error = (dx * dx + dy * dy).sqrt();
            if worst.map_or(true, |(best, ..)| error > best) {
                worst = Some((error, px, py, u, v, w));
            }
        }

        let Some((error, px, py, u, v, w)) = worst else {
            // Every sampled candidate fell outside the projection's domain even though all
            // three corners are defined; leave this triangle as-is.
            self.triangles.push([a, b, c]);
            return;
        };

        if error <= self.options.max_error {
            self.triangles.push([a, b, c]);
            return;
        }

        log::trace!("splitting triangle at depth {depth}, max error {error:.3} at barycentric ({u:.2}, {v:.2}, {w:.2})");
        let p = self.make_vertex(px, py);

        if w == 0.0 {
            // Candidate lies on edge a-b.
            self.split(a, p, c, depth + 1);
            self.split(p, b, c, depth + 1);
        } else if u == 0.0 {
            // Candidate lies on edge b-c.
            self.split(b, p, a, depth + 1);
            self.split(p, c, a, depth + 1);
        } else if v == 0.0 {
            // Candidate lies on edge c-a.
            self.split(c, p, b, depth + 1);
            self.split(p, a, b, depth + 1);
        } else {
            // Interior candidate: fan the triangle into three around it.
            self.split(a, b, p, depth + 1);
            self.split(b, c, p, depth + 1);
            self.split(c, a, p, depth + 1);
        }
    }
}

/// Builds an adaptive mesh approximating the reprojection of a `width`x`height` source raster
/// from its own pixel grid through `converter` into the CRS that `output_to_pixel` addresses.
pub fn run(
    width: u32,
    height: u32,
    pixel_to_input_crs: &Affine,
    converter: &dyn CrsConverter,
    output_to_pixel: &Affine,
    options: MesherOptions,
) -> Result<ReprojectorMesh> {
    if width == 0 || height == 0 {
        return Err(MeshError::InvalidRasterSize { width, height });
    }

    let mut builder = MeshBuilder {
        pixel_to_input_crs,
        converter,
        output_to_pixel,
        options,
        vertices: Vec::new(),
        triangles: Vec::new(),
    };

    let w = width as f64;
    let h = height as f64;
    let tl = builder.make_vertex(0.0, 0.0);
    let tr = builder.make_vertex(w, 0.0);
    let bl = builder.make_vertex(0.0, h);
    let br = builder.make_vertex(w, h);

    builder.split(tl, tr, bl, 0);
    builder.split(br, bl, tr, 0);

    let mut positions = Vec::with_capacity(builder.vertices.len() * 3);
    let mut uvs = Vec::with_capacity(builder.vertices.len() * 2);
    for v in &builder.vertices {
        let input_xy = pixel_to_input_crs.forward(v.px, v.py);
        let output_crs_xy = converter.convert(input_xy.0, input_xy.1).unwrap_or(input_xy);
        positions.push(output_crs_xy.0 as f32);
        positions.push(output_crs_xy.1 as f32);
        positions.push(0.0);
        uvs.push((v.px / w) as f32);
        uvs.push((v.py / h) as f32);
    }

    let indices = builder.triangles.into_iter().flatten().collect();

    Ok(ReprojectorMesh { positions, uvs, indices })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(x: f64, y: f64) -> Option<(f64, f64)> {
        Some((x, y))
    }

    #[test]
    fn identity_reprojection_needs_no_refinement() {
        let pixel_to_input = Affine::from_origin_and_cell_size(0.0, 0.0, 1.0, -1.0);
        let output_to_pixel = Affine::from_origin_and_cell_size(0.0, 0.0, 1.0, -1.0).invert().unwrap();
        let mesh = run(256, 256, &pixel_to_input, &identity, &output_to_pixel, MesherOptions::default()).unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.vertex_count(), 4);
    }

    #[test]
    fn nonlinear_reprojection_refines() {
        let pixel_to_input = Affine::from_origin_and_cell_size(0.0, 0.0, 1.0, -1.0);
        let output_to_pixel = Affine::from_origin_and_cell_size(0.0, 0.0, 1.0, -1.0).invert().unwrap();
        let warped = |x: f64, y: f64| Some((x + (x / 50.0).sin() * 20.0, y));
        let options = MesherOptions { max_error: 0.1, max_depth: 10 };
        let mesh = run(256, 256, &pixel_to_input, &warped, &output_to_pixel, options).unwrap();
        assert!(mesh.triangle_count() > 2);
    }

    #[test]
    fn invalid_raster_size_is_rejected() {
        let a = Affine::from_origin_and_cell_size(0.0, 0.0, 1.0, -1.0);
        let err = run(0, 10, &a, &identity, &a, MesherOptions::default()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidRasterSize);
    }

    #[test]
    fn non_invertible_candidates_are_evicted_not_subdivided() {
        let pixel_to_input = Affine::from_origin_and_cell_size(0.0, 0.0, 1.0, -1.0);
        let output_to_pixel = Affine::from_origin_and_cell_size(0.0, 0.0, 1.0, -1.0).invert().unwrap();
        let partial = |x: f64, y: f64| if x > 100.0 { None } else { Some((x, y)) };
        let options = MesherOptions { max_error: 0.01, max_depth: 6 };
        // Should complete without panicking or hanging even though half the domain is undefined.
        let mesh = run(256, 256, &pixel_to_input, &partial, &output_to_pixel, options).unwrap();
        assert!(mesh.triangle_count() >= 2);
    }
}
