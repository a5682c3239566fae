//! 物理内核：积分、长度约束、球碰撞、最短弧旋转
//!
//! 全部为纯函数，节点之间不共享可变状态，可直接数据并行。

use glam::{Quat, Vec3};

use super::collider::WorldSphere;
use super::node::{CenterMatrix, NodeParams, NodeRest, NodeState};

/// 距离平方的退化阈值
const DEGENERATE_SQ: f32 = 1e-12;

/// 阶段 2 的快照：父骨骼世界旋转与本骨骼世界位置
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodePose {
    pub head: Vec3,
    pub parent_rotation: Quat,
}

impl NodePose {
    pub const IDENTITY: Self = Self {
        head: Vec3::ZERO,
        parent_rotation: Quat::IDENTITY,
    };
}

/// 单帧步进参数
#[derive(Clone, Copy, Debug)]
pub struct StepParams {
    pub dt: f32,
    /// 外力加速度（与节点重力相加）
    pub external_force: Vec3,
    pub collision_enabled: bool,
}

/// 把尾端投影回以 head 为球心、半径 length 的球面
///
/// 尾端与 head 重合时沿 `fallback` 方向放置。
#[inline]
pub fn project_to_length(head: Vec3, tail: Vec3, length: f32, fallback: Vec3) -> Vec3 {
    let dir = tail - head;
    let dir = if dir.length_squared() > DEGENERATE_SQ {
        dir.normalize()
    } else {
        fallback
    };
    head + dir * length
}

/// 最短弧旋转（from → to），输入无需归一化
#[inline]
pub fn from_to_rotation(from: Vec3, to: Vec3) -> Quat {
    let from = from.normalize_or_zero();
    let to = to.normalize_or_zero();
    if from == Vec3::ZERO || to == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_arc(from, to)
}

/// 把尾端推出单个球
///
/// 先沿球心→尾端方向推到 `radius + hit_radius`，再投影回长度球面；
/// 投影后若仍然穿透且两球相交，则取两球交线圆上离尾端最近的点。
pub fn resolve_sphere(
    head: Vec3,
    length: f32,
    tail: Vec3,
    sphere: &WorldSphere,
    hit_radius: f32,
) -> Vec3 {
    let r = sphere.radius + hit_radius;
    let offset = tail - sphere.center;
    let dist_sq = offset.length_squared();
    if dist_sq >= r * r {
        return tail;
    }

    let bone_dir = (tail - head).normalize_or(Vec3::Y);
    let normal = if dist_sq > DEGENERATE_SQ {
        offset / dist_sq.sqrt()
    } else {
        // 尾端恰在球心，沿 球心→head 反方向 推出
        (head - sphere.center).normalize_or(bone_dir)
    };

    let pushed = sphere.center + normal * r;
    let projected = project_to_length(head, pushed, length, bone_dir);
    if (projected - sphere.center).length_squared() >= r * r * (1.0 - 1e-5) {
        return projected;
    }

    intersection_circle_point(head, length, sphere.center, r, projected).unwrap_or(projected)
}

/// 长度球 (head, length) 与碰撞球 (center, r) 交线圆上离 `near` 最近的点
///
/// 两球不相交（或 head 被碰撞球完全包住）时返回 None。
fn intersection_circle_point(
    head: Vec3,
    length: f32,
    center: Vec3,
    r: f32,
    near: Vec3,
) -> Option<Vec3> {
    let axis = center - head;
    let d = axis.length();
    if d * d <= DEGENERATE_SQ || d > length + r || d + length < r || d + r < length {
        return None;
    }
    let n = axis / d;
    let a = (length * length - r * r + d * d) / (2.0 * d);
    let h = (length * length - a * a).max(0.0).sqrt();

    let rel = near - head;
    let perp = rel - n * n.dot(rel);
    let perp = if perp.length_squared() > DEGENERATE_SQ {
        perp.normalize()
    } else {
        n.any_orthonormal_vector()
    };
    Some(head + n * a + perp * h)
}

/// 单节点单帧步进，返回骨骼新的本地旋转
///
/// `state` 位于节点参考系（世界或 Center），`pose` 与 `spheres` 位于世界空间。
pub fn step_node<'a>(
    rest: &NodeRest,
    params: &NodeParams,
    state: &mut NodeState,
    pose: NodePose,
    center: Option<&CenterMatrix>,
    step: &StepParams,
    spheres: impl Iterator<Item = &'a WorldSphere>,
) -> Quat {
    let (current, prev) = match center {
        Some(m) => (
            m.to_world.transform_point3(state.current_tail),
            m.to_world.transform_point3(state.prev_tail),
        ),
        None => (state.current_tail, state.prev_tail),
    };

    let parent_rest = pose.parent_rotation * rest.initial_local_rotation;
    let rest_dir = parent_rest * rest.bone_axis;
    let dt = step.dt;

    // verlet：惯性 + 刚度 + 重力/外力
    let acceleration = params.gravity_dir * params.gravity_power + step.external_force;
    let mut next = current
        + (current - prev) * (1.0 - params.drag)
        + rest_dir * (params.stiffness * dt)
        + acceleration * dt;

    next = project_to_length(pose.head, next, rest.length, rest_dir);

    if step.collision_enabled {
        for sphere in spheres {
            next = resolve_sphere(pose.head, rest.length, next, sphere, params.hit_radius);
        }
    }

    match center {
        Some(m) => {
            state.prev_tail = m.to_center.transform_point3(current);
            state.current_tail = m.to_center.transform_point3(next);
        }
        None => {
            state.prev_tail = current;
            state.current_tail = next;
        }
    }

    // world = fromTo(rest_dir, 新方向) * parent * initial_local；local = parent⁻¹ * world
    let world_rotation = from_to_rotation(rest_dir, next - pose.head) * parent_rest;
    (pose.parent_rotation.inverse() * world_rotation).normalize()
}
