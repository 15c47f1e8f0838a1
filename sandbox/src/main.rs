// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


// Tessera Sandbox
// Plays the host: registers a tiled ground mesh, sweeps a camera over it and
// uploads whatever the stream service hands back.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tessera_sdk::prelude::*;

const GRID: usize = 8;
const TILE_SIZE: f32 = 4.0;
const VIEW_RADIUS: f32 = 10.0;
const FRAMES: usize = 48;
const FRAME_TIME: Duration = Duration::from_millis(16);

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
}

/// Two triangles per tile, in tile-local vertex numbering.
const TILE_INDICES: [u16; 6] = [0, 1, 2, 2, 1, 3];

fn tile_id(x: usize, z: usize) -> String {
    format!("tile_{x}_{z}")
}

fn tile_center(x: usize, z: usize) -> [f32; 2] {
    [
        (x as f32 + 0.5) * TILE_SIZE,
        (z as f32 + 0.5) * TILE_SIZE,
    ]
}

/// A `GRID x GRID` ground plane where every tile is its own submesh.
fn build_ground() -> MeshDescriptor {
    let mut vertices = Vec::with_capacity(GRID * GRID * 4);
    let mut indices = Vec::with_capacity(GRID * GRID * 6);
    let mut submeshes = Vec::with_capacity(GRID * GRID);

    let vertex_bytes = 4 * std::mem::size_of::<Vertex>();
    let index_bytes = TILE_INDICES.len() * std::mem::size_of::<u16>();

    for z in 0..GRID {
        for x in 0..GRID {
            let tile = submeshes.len();
            let (x0, z0) = (x as f32 * TILE_SIZE, z as f32 * TILE_SIZE);
            for (dx, dz) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)] {
                vertices.push(Vertex {
                    position: [x0 + dx * TILE_SIZE, 0.0, z0 + dz * TILE_SIZE],
                    normal: [0.0, 1.0, 0.0],
                });
            }
            indices.extend_from_slice(&TILE_INDICES);

            submeshes.push(
                SubmeshDescriptor::new(tile_id(x, z))
                    .with_segment("position", Segment::new(tile * vertex_bytes, vertex_bytes))
                    .with_indices(IndexSegment::for_format(
                        tile * index_bytes,
                        TILE_INDICES.len() as u32,
                        0,
                        3,
                        IndexFormat::U16,
                    )),
            );
        }
    }

    let mut descriptor = MeshDescriptor::new()
        .with_channel(ChannelDescriptor::attribute(
            "position",
            bytemuck::cast_slice::<Vertex, u8>(&vertices).to_vec(),
        ))
        .with_channel(ChannelDescriptor::index(
            "index",
            bytemuck::cast_slice::<u16, u8>(&indices).to_vec(),
        ));
    descriptor.submeshes = submeshes;
    descriptor
}

/// The visible tiles around a camera at `eye`, with distance and size hints.
fn visibility_from(eye: [f32; 2]) -> VisibilityUpdate {
    let mut visible = Vec::new();
    let mut update = VisibilityUpdate::default();
    for z in 0..GRID {
        for x in 0..GRID {
            let [cx, cz] = tile_center(x, z);
            let distance = ((cx - eye[0]).powi(2) + (cz - eye[1]).powi(2)).sqrt();
            if distance <= VIEW_RADIUS {
                let id = SubmeshId::from(tile_id(x, z));
                update.distance_hint.insert(id.clone(), distance);
                update.size_hint.insert(id.clone(), TILE_SIZE * TILE_SIZE);
                visible.push(id);
            }
        }
    }
    update.visible_ids = visible;
    update
}

/// Loads a RON configuration from the first argument, if any.
fn load_config() -> Result<StreamConfig> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(StreamConfig::default());
    };
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read stream config '{path}'"))?;
    StreamConfig::from_ron_str(&text).with_context(|| format!("invalid stream config '{path}'"))
}

/// Stand-in for a GPU upload: checks the buffers and logs what would be drawn.
fn upload(loan: &BufferLoan) -> Result<()> {
    let position = loan
        .channel("position")
        .context("loan has no position channel")?;
    let index = loan.channel("index").context("loan has no index channel")?;

    let vertex_count = position.used_length / std::mem::size_of::<Vertex>();
    let words: Vec<u16> = index
        .used_bytes()
        .chunks_exact(2)
        .map(|w| u16::from_le_bytes([w[0], w[1]]))
        .collect();
    if let Some(&max) = words.iter().max() {
        if max as usize >= vertex_count {
            bail!("index {max} points past {vertex_count} vertices");
        }
    }

    log::info!(
        "Upload: {} vertices, {} triangles",
        vertex_count,
        loan.primitive_count
    );
    Ok(())
}

fn handle_event(host: &StreamHost, event: StreamEvent) -> Result<()> {
    match event {
        StreamEvent::Registered { mesh_id } => log::info!("Mesh {mesh_id} registered"),
        StreamEvent::BufferReady(loan) => {
            upload(&loan)?;
            host.return_buffers(loan)?;
        }
        StreamEvent::Status(status) => log::info!("Status: {status:?}"),
        StreamEvent::Failed { mesh_id, error } => bail!("mesh {mesh_id} failed: {error}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    log::info!("Stream config: {config:?}");

    let (mut service, host) = StreamService::new(config);
    service.start();

    let mesh_id = host.register(build_ground())?;

    for frame in 0..FRAMES {
        // Sweep diagonally across the grid and back.
        let t = frame as f32 / (FRAMES - 1) as f32;
        let along = (1.0 - (2.0 * t - 1.0).abs()) * GRID as f32 * TILE_SIZE;
        host.update_visibility(mesh_id, visibility_from([along, along]))?;

        while let Some(event) = host.recv_event_timeout(FRAME_TIME)? {
            handle_event(&host, event)?;
        }
    }

    host.query_status(mesh_id)?;
    while let Some(event) = host.recv_event_timeout(Duration::from_secs(1))? {
        if let StreamEvent::Status(status) = event {
            log::info!(
                "Final: {}/{} tiles resident, {} handoffs",
                status.resident_submeshes,
                status.total_submeshes,
                status.handoffs
            );
            break;
        }
        handle_event(&host, event)?;
    }

    host.shutdown()?;
    service.stop();
    Ok(())
}
