//! Headless culling demo
//!
//! Builds a small scene with both partitioner implementations, flushes the
//! staged writes and reports what each camera can see. Also compiles a
//! procedural mesh through the static geometry culler and prints the
//! per-material batches that survive the frustum.

use prism_engine::prelude::*;

/// A floor grid of quads split across two materials
fn build_floor_mesh(cells_per_side: u32, cell_size: f32) -> MeshData {
    let mut positions = Vec::new();
    let mut checker_indices = Vec::new();
    let mut border_indices = Vec::new();

    for row in 0..cells_per_side {
        for col in 0..cells_per_side {
            let x = col as f32 * cell_size;
            let z = row as f32 * cell_size;
            let base = positions.len() as u32;

            positions.push(Vec3::new(x, 0.0, z));
            positions.push(Vec3::new(x + cell_size, 0.0, z));
            positions.push(Vec3::new(x + cell_size, 0.0, z + cell_size));
            positions.push(Vec3::new(x, 0.0, z + cell_size));

            let quad = [base, base + 1, base + 2, base, base + 2, base + 3];
            let on_border = row == 0 || col == 0 || row + 1 == cells_per_side || col + 1 == cells_per_side;
            if on_border {
                border_indices.extend_from_slice(&quad);
            } else {
                checker_indices.extend_from_slice(&quad);
            }
        }
    }

    MeshData::new(
        positions,
        vec![
            SubMesh::new(MaterialId(0), checker_indices),
            SubMesh::new(MaterialId(1), border_indices),
        ],
    )
}

fn populate(scene: &mut SceneManager) {
    // One large actor anchoring the world volume, then a scattering of
    // smaller objects
    scene.add_actor(
        ActorId(0),
        AABB::from_center_extents(Vec3::zeros(), Vec3::new(64.0, 64.0, 64.0)),
    );

    for i in 1..=20u32 {
        let angle = i as f32 * 0.6;
        let center = Vec3::new(angle.cos() * 30.0, 0.0, angle.sin() * 30.0);
        scene.add_actor(
            ActorId(i),
            AABB::from_center_extents(center, Vec3::new(1.5, 1.5, 1.5)),
        );
    }

    scene.add_light(
        LightId(0),
        AABB::from_center_extents(Vec3::new(0.0, 20.0, 0.0), Vec3::new(30.0, 30.0, 30.0)),
    );
    scene.add_light(
        LightId(1),
        AABB::from_center_extents(Vec3::new(45.0, 5.0, 45.0), Vec3::new(8.0, 8.0, 8.0)),
    );

    scene.add_particle_system(
        ParticleSystemId(0),
        AABB::from_center_extents(Vec3::new(-20.0, 2.0, 10.0), Vec3::new(3.0, 3.0, 3.0)),
    );

    scene.add_geom(
        GeomId(0),
        AABB::new(Vec3::new(-60.0, -1.0, -60.0), Vec3::new(60.0, 1.0, 60.0)),
    );
}

fn run_partitioner(kind: PartitionerKind) {
    let config = CullingConfig {
        partitioner: kind,
        ..CullingConfig::default()
    };

    let mut scene = SceneManager::new(config.create_partitioner());
    populate(&mut scene);

    if let Err(error) = scene.apply_writes() {
        log::error!("failed to apply staged writes: {error}");
        return;
    }

    let mut forward = Camera::perspective(60f32.to_radians(), 16.0 / 9.0, 0.1, 200.0);
    forward.look_at(Vec3::new(0.0, 10.0, 55.0), Vec3::zeros(), Vec3::new(0.0, 1.0, 0.0));
    let forward_id = scene.add_camera(forward);

    let mut skyward = Camera::perspective(60f32.to_radians(), 16.0 / 9.0, 0.1, 200.0);
    skyward.look_at(
        Vec3::new(0.0, 10.0, 55.0),
        Vec3::new(0.0, 200.0, 55.0),
        Vec3::new(0.0, 0.0, -1.0),
    );
    let skyward_id = scene.add_camera(skyward);

    for (name, camera_id) in [("forward", forward_id), ("skyward", skyward_id)] {
        let (lights, geometry) = scene.visible_lights_and_geometry(camera_id);
        log::info!(
            "{kind:?} / {name} camera: {} lights, {} geometry nodes",
            lights.len(),
            geometry.len()
        );
    }
}

fn run_geom_culler() {
    let mesh = build_floor_mesh(16, 4.0);
    log::info!("compiling floor mesh: {} triangles", mesh.triangle_count());

    let mut culler = GeomCuller::new(mesh);
    culler.compile();

    let mut camera = Camera::perspective(70f32.to_radians(), 16.0 / 9.0, 0.1, 300.0);
    camera.look_at(
        Vec3::new(32.0, 25.0, 90.0),
        Vec3::new(32.0, 0.0, 32.0),
        Vec3::new(0.0, 1.0, 0.0),
    );

    let batches = culler.renderables_visible(camera.frustum());
    for batch in &batches {
        log::info!(
            "material {:?}: {} visible triangles",
            batch.material_id,
            batch.indices.len() / 3
        );
    }
}

fn main() {
    env_logger::init();

    run_partitioner(PartitionerKind::Octree);
    run_partitioner(PartitionerKind::SpatialHash);
    run_geom_culler();
}
