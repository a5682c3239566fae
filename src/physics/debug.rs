//! 调试可视化（只读）
//!
//! 只读取已完成帧的结果，输出与图形后端无关的线框几何，
//! 绝不回写求解器。

use glam::Vec3;

use super::collider::WorldSphere;

/// RGBA 颜色（每通道 0-255）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebugColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl DebugColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const GREEN: Self = Self::new(50, 255, 50, 255);
    pub const YELLOW: Self = Self::new(255, 255, 50, 255);
    pub const MAGENTA: Self = Self::new(255, 50, 255, 255);
}

/// 线段
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DebugLine {
    pub start: Vec3,
    pub end: Vec3,
    pub color: DebugColor,
}

/// 线框球
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DebugSphere {
    pub center: Vec3,
    pub radius: f32,
    pub color: DebugColor,
}

/// 单节点结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeDebug {
    /// 本帧求解时使用的骨骼位置
    pub head: Vec3,
    /// 求解后的尾端（世界空间）
    pub tail: Vec3,
    pub hit_radius: f32,
}

/// 画什么
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DebugDrawFlags {
    pub draw_bones: bool,
    pub draw_hit_radius: bool,
    pub draw_colliders: bool,
}

impl Default for DebugDrawFlags {
    fn default() -> Self {
        Self {
            draw_bones: true,
            draw_hit_radius: false,
            draw_colliders: true,
        }
    }
}

/// 上一完成帧的快照（节点顺序与调度器扁平顺序一致）
///
/// `NodeDebug::head` 是求解该帧时快照的骨骼位置，骨长以它为准；
/// 链在运动时，写回旋转后骨骼的实际位置可能与之略有偏差，
/// 需要实时骨骼位置时请直接读取骨骼。
#[derive(Clone, Debug, Default)]
pub struct DebugSnapshot {
    pub nodes: Vec<NodeDebug>,
    pub spheres: Vec<WorldSphere>,
}

/// 一帧的调试几何
#[derive(Clone, Debug, Default)]
pub struct DebugDrawData {
    pub lines: Vec<DebugLine>,
    pub spheres: Vec<DebugSphere>,
}

impl DebugSnapshot {
    pub fn draw(&self, flags: DebugDrawFlags) -> DebugDrawData {
        let mut data = DebugDrawData::default();
        for node in &self.nodes {
            if flags.draw_bones {
                data.lines.push(DebugLine {
                    start: node.head,
                    end: node.tail,
                    color: DebugColor::YELLOW,
                });
            }
            if flags.draw_hit_radius && node.hit_radius > 0.0 {
                data.spheres.push(DebugSphere {
                    center: node.tail,
                    radius: node.hit_radius,
                    color: DebugColor::GREEN,
                });
            }
        }
        if flags.draw_colliders {
            data.spheres.extend(self.spheres.iter().map(|s| DebugSphere {
                center: s.center,
                radius: s.radius,
                color: DebugColor::MAGENTA,
            }));
        }
        data
    }
}
