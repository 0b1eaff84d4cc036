//! Triangle meshes produced by mesh export, with the closed-manifold test
//! the export invariant needs.

use std::collections::HashMap;
use std::io::Write;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// An indexed triangle mesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Point3<f64>>,
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn new(vertices: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    /// Number of undirected edges used by exactly one triangle.
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_use().values().filter(|&&n| n == 1).count()
    }

    /// True when every undirected edge is shared by exactly two triangles.
    ///
    /// An empty mesh is not watertight.
    pub fn is_watertight(&self) -> bool {
        let edges = self.edge_use();
        !edges.is_empty() && edges.values().all(|&n| n == 2)
    }

    fn edge_use(&self) -> HashMap<(u32, u32), usize> {
        let mut edges: HashMap<(u32, u32), usize> = HashMap::new();
        for f in &self.faces {
            for (a, b) in [(f[0], f[1]), (f[1], f[2]), (f[2], f[0])] {
                *edges.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
        edges
    }

    /// Write the mesh as binary STL (80-byte header, little-endian).
    pub fn write_stl<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        let mut header = [b' '; 80];
        let text = b"rigspec binary STL";
        header[..text.len()].copy_from_slice(text);
        writer.write_all(&header)?;

        let count = u32::try_from(self.faces.len())
            .map_err(|_| std::io::Error::other("too many triangles for STL"))?;
        writer.write_all(&count.to_le_bytes())?;

        for f in &self.faces {
            let [v0, v1, v2] = f.map(|i| self.vertices.get(i as usize).copied().unwrap_or_else(Point3::origin));
            let n = (v1 - v0).cross(&(v2 - v0));
            let len = n.norm();
            let n = if len > f64::EPSILON { n / len } else { n };
            for v in [n.x, n.y, n.z] {
                writer.write_all(&(v as f32).to_le_bytes())?;
            }
            for p in [v0, v1, v2] {
                for c in [p.x, p.y, p.z] {
                    writer.write_all(&(c as f32).to_le_bytes())?;
                }
            }
            writer.write_all(&0u16.to_le_bytes())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetrahedron() -> Mesh {
        Mesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]],
        )
    }

    #[test]
    fn closed_tetrahedron_is_watertight() {
        let m = tetrahedron();
        assert!(m.is_watertight());
        assert_eq!(m.boundary_edge_count(), 0);
        assert_eq!(m.triangle_count(), 4);
    }

    #[test]
    fn missing_face_opens_the_mesh() {
        let mut m = tetrahedron();
        m.faces.pop();
        assert!(!m.is_watertight());
        assert_eq!(m.boundary_edge_count(), 3);
    }

    #[test]
    fn empty_mesh_is_not_watertight() {
        assert!(!Mesh::default().is_watertight());
    }

    #[test]
    fn stl_size_matches_triangle_count() {
        let mut buf = Vec::new();
        tetrahedron().write_stl(&mut buf).unwrap();
        assert_eq!(buf.len(), 84 + 4 * 50);
        assert_eq!(u32::from_le_bytes([buf[80], buf[81], buf[82], buf[83]]), 4);
    }
}
