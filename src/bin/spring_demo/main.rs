//! Spring Bone 演示
//!
//! 构建一条挂在头部的发束，头部带球形碰撞体，
//! 头部左右摆动若干帧后输出发束尾端与碰撞球。
//!
//! 运行：`RUST_LOG=info cargo run --bin spring_demo --features demo`

use std::sync::Arc;

use glam::{Quat, Vec3};
use spring_bone_engine::physics::DebugDrawFlags;
use spring_bone_engine::{
    BoneSet, BoneTransform, ColliderGroup, SharedSkeleton, SphereCollider, SpringBoneConfig,
    SpringBoneScheduler, SpringBoneSettings,
};

const HAIR_SEGMENTS: usize = 5;
const SEGMENT_LENGTH: f32 = 0.06;
const FRAMES: usize = 240;
const DT: f32 = 1.0 / 60.0;

/// 返回骨骼与头部骨骼索引
fn build_character() -> spring_bone_engine::Result<(SharedSkeleton, usize)> {
    let mut skeleton = BoneSet::new();
    let root = skeleton.add_bone("root", None, BoneTransform::default())?;
    let neck = skeleton.add_bone("neck", Some(root), BoneTransform::from_translation(Vec3::Y * 1.4))?;
    let head = skeleton.add_bone("head", Some(neck), BoneTransform::from_translation(Vec3::Y * 0.1))?;

    // 发束从头顶后侧向后伸出
    let mut parent = skeleton.add_bone(
        "hair_0",
        Some(head),
        BoneTransform::from_translation(Vec3::new(0.0, 0.12, -0.08)),
    )?;
    let hair_root = parent;
    for i in 1..HAIR_SEGMENTS {
        parent = skeleton.add_bone(
            format!("hair_{i}"),
            Some(parent),
            BoneTransform::from_translation(Vec3::new(0.0, 0.0, -SEGMENT_LENGTH)),
        )?;
    }

    let head_collider = Arc::new(ColliderGroup::new(
        "head",
        head,
        vec![SphereCollider::new(Vec3::new(0.0, 0.08, 0.0), 0.1)],
    ));

    let mut hair = SpringBoneSettings::new("hair")
        .with_roots([hair_root])
        .with_collider_group(head_collider);
    hair.stiffness = 0.8;
    hair.drag = 0.3;
    hair.gravity_power = 1.0;
    hair.hit_radius = 0.02;
    hair.center = Some(root);
    skeleton.add_spring(hair);

    Ok((skeleton.into_shared(), head))
}

fn main() -> spring_bone_engine::Result<()> {
    env_logger::init();

    let (skeleton, head) = build_character()?;
    let mut scheduler = SpringBoneScheduler::with_config(SpringBoneConfig::default())?;
    let handle = scheduler.add_instance(Arc::clone(&skeleton))?;
    log::info!(
        "实例 {:?}: {} 节点, {} 碰撞体组",
        handle,
        scheduler.node_count(),
        scheduler.collider_group_count()
    );

    for frame in 0..FRAMES {
        // 写动画姿态前必须等上一帧作业结束
        scheduler.complete()?;
        {
            let mut bones = skeleton.write().unwrap_or_else(|e| e.into_inner());
            let angle = (frame as f32 * DT * 3.0).sin() * 0.6;
            bones.set_local_rotation(head, Quat::from_rotation_y(angle));
            bones.update_world_transforms();
        }
        if frame == FRAMES / 2 {
            // 后半段加一阵侧风
            scheduler.set_external_force(Vec3::new(1.5, 0.0, 0.0));
        }
        scheduler.update(DT)?;
    }

    let snapshot = scheduler.debug_snapshot()?;
    for (i, node) in snapshot.nodes.iter().enumerate() {
        println!(
            "node {i}: head=({:.3}, {:.3}, {:.3}) tail=({:.3}, {:.3}, {:.3}) len={:.4}",
            node.head.x,
            node.head.y,
            node.head.z,
            node.tail.x,
            node.tail.y,
            node.tail.z,
            node.head.distance(node.tail)
        );
    }

    let draw = snapshot.draw(DebugDrawFlags::default());
    println!("debug draw: {} lines, {} spheres", draw.lines.len(), draw.spheres.len());

    scheduler.remove_instance(handle);
    Ok(())
}
