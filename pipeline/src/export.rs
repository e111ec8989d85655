//! Binary glTF export.
//!
//! Writes exactly the geometry it is given: no welding, no reordering, no
//! normal generation.

use gltf::json as gj;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::types::MeshResult;

const GLB_MAGIC: u32 = 0x46546C67; // "glTF"
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E4942; // "BIN\0"

/// Encode `mesh` as a self-contained `.glb`.
///
/// A mesh without faces is emitted as a point primitive, since an index
/// accessor with zero elements is not valid glTF.
pub fn encode_glb(mesh: &MeshResult) -> Result<Vec<u8>> {
    validate(mesh)?;

    let mut buffer_data = Vec::with_capacity(mesh.vertex_count() * 12 + mesh.face_count() * 12);
    let mut root = gj::Root::default();

    // Positions
    let position_bytes: Vec<u8> = mesh
        .vertices
        .iter()
        .flat_map(|v| v.iter().flat_map(|c| c.to_le_bytes()))
        .collect();
    let position_view = push_buffer_view(
        &mut root,
        &mut buffer_data,
        &position_bytes,
        gj::buffer::Target::ArrayBuffer,
    );
    let (min, max) = position_bounds(&mesh.vertices);
    let position_accessor = push_accessor(
        &mut root,
        position_view,
        mesh.vertex_count(),
        gj::accessor::ComponentType::F32,
        gj::accessor::Type::Vec3,
        Some(gj::Value::from(min.to_vec())),
        Some(gj::Value::from(max.to_vec())),
    );

    // Indices
    let indices = if mesh.faces.is_empty() {
        None
    } else {
        let index_bytes: Vec<u8> = mesh
            .faces
            .iter()
            .flat_map(|f| f.iter().flat_map(|i| i.to_le_bytes()))
            .collect();
        let index_view = push_buffer_view(
            &mut root,
            &mut buffer_data,
            &index_bytes,
            gj::buffer::Target::ElementArrayBuffer,
        );
        Some(push_accessor(
            &mut root,
            index_view,
            mesh.face_count() * 3,
            gj::accessor::ComponentType::U32,
            gj::accessor::Type::Scalar,
            None,
            None,
        ))
    };

    let mode = if indices.is_some() {
        gj::mesh::Mode::Triangles
    } else {
        gj::mesh::Mode::Points
    };

    let mut attributes = BTreeMap::new();
    attributes.insert(
        gj::validation::Checked::Valid(gj::mesh::Semantic::Positions),
        gj::Index::new(position_accessor),
    );

    root.meshes.push(gj::Mesh {
        name: Some("mesh".to_string()),
        primitives: vec![gj::mesh::Primitive {
            attributes,
            extensions: None,
            extras: gj::Extras::default(),
            indices: indices.map(gj::Index::new),
            material: None,
            mode: gj::validation::Checked::Valid(mode),
            targets: None,
        }],
        weights: None,
        extensions: None,
        extras: gj::Extras::default(),
    });

    root.nodes.push(gj::Node {
        mesh: Some(gj::Index::new(0)),
        ..gj::Node::default()
    });

    root.scenes.push(gj::Scene {
        name: None,
        nodes: vec![gj::Index::new(0)],
        extensions: None,
        extras: gj::Extras::default(),
    });
    root.scene = Some(gj::Index::new(0));

    root.buffers.push(gj::Buffer {
        byte_length: gj::validation::USize64(buffer_data.len() as u64),
        name: None,
        uri: None,
        extensions: None,
        extras: gj::Extras::default(),
    });

    pack_glb(&root, &buffer_data)
}

/// Encode `mesh` and write it to `path`, replacing any existing file.
pub fn write_glb(mesh: &MeshResult, path: &Path) -> Result<()> {
    let bytes = encode_glb(mesh)?;
    std::fs::write(path, &bytes)?;
    tracing::debug!(
        path = %path.display(),
        bytes = bytes.len(),
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "Wrote GLB"
    );
    Ok(())
}

fn validate(mesh: &MeshResult) -> Result<()> {
    if mesh.vertices.is_empty() {
        return Err(PipelineError::Export("mesh has no vertices".to_string()));
    }

    let vertex_count = mesh.vertex_count();
    if let Some((face, index)) = mesh.faces.iter().enumerate().find_map(|(n, face)| {
        face.iter()
            .find(|&&i| i as usize >= vertex_count)
            .map(|&i| (n, i))
    }) {
        return Err(PipelineError::Export(format!(
            "face {face} references vertex {index} but mesh has {vertex_count} vertices"
        )));
    }

    Ok(())
}

fn position_bounds(vertices: &[[f32; 3]]) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for v in vertices {
        for axis in 0..3 {
            min[axis] = min[axis].min(v[axis]);
            max[axis] = max[axis].max(v[axis]);
        }
    }
    (min, max)
}

fn align(buffer_data: &mut Vec<u8>) {
    let padding = (4 - (buffer_data.len() % 4)) % 4;
    buffer_data.extend(std::iter::repeat_n(0u8, padding));
}

fn push_buffer_view(
    root: &mut gj::Root,
    buffer_data: &mut Vec<u8>,
    data: &[u8],
    target: gj::buffer::Target,
) -> u32 {
    align(buffer_data);
    let offset = buffer_data.len();
    buffer_data.extend_from_slice(data);

    let view_idx = root.buffer_views.len() as u32;
    root.buffer_views.push(gj::buffer::View {
        buffer: gj::Index::new(0),
        byte_offset: Some(gj::validation::USize64(offset as u64)),
        byte_length: gj::validation::USize64(data.len() as u64),
        byte_stride: None,
        target: Some(gj::validation::Checked::Valid(target)),
        name: None,
        extensions: None,
        extras: gj::Extras::default(),
    });
    view_idx
}

fn push_accessor(
    root: &mut gj::Root,
    buffer_view: u32,
    count: usize,
    component_type: gj::accessor::ComponentType,
    type_: gj::accessor::Type,
    min: Option<gj::Value>,
    max: Option<gj::Value>,
) -> u32 {
    let acc_idx = root.accessors.len() as u32;
    root.accessors.push(gj::Accessor {
        buffer_view: Some(gj::Index::new(buffer_view)),
        byte_offset: Some(gj::validation::USize64(0)),
        count: gj::validation::USize64(count as u64),
        component_type: gj::validation::Checked::Valid(gj::accessor::GenericComponentType(
            component_type,
        )),
        type_: gj::validation::Checked::Valid(type_),
        min,
        max,
        normalized: false,
        name: None,
        sparse: None,
        extensions: None,
        extras: gj::Extras::default(),
    });
    acc_idx
}

fn pack_glb(root: &gj::Root, buffer_data: &[u8]) -> Result<Vec<u8>> {
    let json_bytes = root
        .to_vec()
        .map_err(|e| PipelineError::Export(format!("JSON serialization failed: {e}")))?;

    let json_pad = (4 - (json_bytes.len() % 4)) % 4;
    let json_chunk_len = json_bytes.len() + json_pad;
    let bin_pad = (4 - (buffer_data.len() % 4)) % 4;
    let bin_chunk_len = buffer_data.len() + bin_pad;
    let total_length = 12 + 8 + json_chunk_len + 8 + bin_chunk_len;

    if total_length > u32::MAX as usize {
        return Err(PipelineError::Export(format!(
            "mesh too large for GLB ({total_length} bytes)"
        )));
    }

    let mut glb = Vec::with_capacity(total_length);

    glb.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    glb.extend_from_slice(&GLB_VERSION.to_le_bytes());
    glb.extend_from_slice(&(total_length as u32).to_le_bytes());

    glb.extend_from_slice(&(json_chunk_len as u32).to_le_bytes());
    glb.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    glb.extend_from_slice(&json_bytes);
    glb.extend(std::iter::repeat_n(b' ', json_pad));

    glb.extend_from_slice(&(bin_chunk_len as u32).to_le_bytes());
    glb.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    glb.extend_from_slice(buffer_data);
    glb.extend(std::iter::repeat_n(0u8, bin_pad));

    Ok(glb)
}
