//! Spring Bone 节点
//!
//! 每个节点对应一段骨骼：
//! - 不变参数：所驱动骨骼、父骨骼、静止轴与长度、刚度/阻力/重力/碰撞半径、Center 槽位
//! - 可变状态：上一帧尾端与当前尾端（位于节点的参考系中：世界或 Center）

use glam::{Mat4, Quat, Vec3};

/// 节点物理参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeParams {
    /// 刚度（回到动画姿态的力度）
    pub stiffness: f32,
    /// 阻力 [0, 1]，1 表示完全抹掉惯性
    pub drag: f32,
    /// 重力方向（单位向量）
    pub gravity_dir: Vec3,
    /// 重力大小
    pub gravity_power: f32,
    /// 尾端碰撞半径
    pub hit_radius: f32,
}

impl Default for NodeParams {
    fn default() -> Self {
        Self {
            stiffness: 1.0,
            drag: 0.4,
            gravity_dir: Vec3::NEG_Y,
            gravity_power: 0.0,
            hit_radius: 0.02,
        }
    }
}

/// 节点静止姿态（构建时计算一次）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeRest {
    /// 骨骼初始本地旋转
    pub initial_local_rotation: Quat,
    /// 骨骼本地空间中指向尾端的单位轴
    pub bone_axis: Vec3,
    /// 骨骼长度（世界空间）
    pub length: f32,
}

/// 节点模拟状态
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeState {
    pub prev_tail: Vec3,
    pub current_tail: Vec3,
}

impl NodeState {
    /// 静止状态（上一帧 = 当前帧）
    #[inline]
    pub fn at_rest(tail: Vec3) -> Self {
        Self { prev_tail: tail, current_tail: tail }
    }
}

/// 构建节点时的初始姿态（世界空间）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BindPose {
    /// 骨骼初始本地旋转
    pub local_rotation: Quat,
    pub head: Vec3,
    /// 骨骼初始世界旋转
    pub head_rotation: Quat,
    pub tail: Vec3,
}

/// Center 参考系矩阵（调用线程每帧刷新）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CenterMatrix {
    pub to_world: Mat4,
    pub to_center: Mat4,
}

impl CenterMatrix {
    pub const IDENTITY: Self = Self {
        to_world: Mat4::IDENTITY,
        to_center: Mat4::IDENTITY,
    };

    pub fn from_world(to_world: Mat4) -> Self {
        Self {
            to_world,
            to_center: to_world.inverse(),
        }
    }
}

/// Spring Bone 节点（实例内部）
#[derive(Clone, Debug)]
pub struct SpringNode {
    /// 所驱动骨骼（实例内索引）
    pub(crate) bone: usize,
    /// 父骨骼，根骨骼为 None（父旋转视为单位旋转）
    pub(crate) parent: Option<usize>,
    pub(crate) rest: NodeRest,
    pub(crate) params: NodeParams,
    /// Center 槽位（实例内 Center 列表索引）
    pub(crate) center: Option<u32>,
    /// 引用的碰撞体组（实例内去重后的组索引）
    pub(crate) collider_groups: Vec<u32>,
    pub(crate) state: NodeState,
    pub(crate) initial_state: NodeState,
}

impl SpringNode {
    /// 从初始姿态构建节点
    ///
    /// `center` 给出槽位及其当前矩阵时，状态存储在 Center 空间。
    pub fn new(
        bone: usize,
        parent: Option<usize>,
        pose: BindPose,
        params: NodeParams,
        center: Option<(u32, CenterMatrix)>,
        collider_groups: Vec<u32>,
    ) -> Self {
        let BindPose { local_rotation, head, head_rotation, tail } = pose;
        let offset = tail - head;
        let length = offset.length();
        let bone_axis = (head_rotation.inverse() * offset).normalize_or(Vec3::Y);

        let stored_tail = match center {
            Some((_, m)) => m.to_center.transform_point3(tail),
            None => tail,
        };
        let state = NodeState::at_rest(stored_tail);

        Self {
            bone,
            parent,
            rest: NodeRest {
                initial_local_rotation: local_rotation,
                bone_axis,
                length,
            },
            params: NodeParams {
                gravity_dir: params.gravity_dir.normalize_or_zero(),
                drag: params.drag.clamp(0.0, 1.0),
                ..params
            },
            center: center.map(|(slot, _)| slot),
            collider_groups,
            state,
            initial_state: state,
        }
    }

    #[inline]
    pub fn bone(&self) -> usize {
        self.bone
    }

    #[inline]
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    #[inline]
    pub fn rest(&self) -> &NodeRest {
        &self.rest
    }

    #[inline]
    pub fn params(&self) -> &NodeParams {
        &self.params
    }

    #[inline]
    pub fn center(&self) -> Option<u32> {
        self.center
    }

    #[inline]
    pub fn has_center(&self) -> bool {
        self.center.is_some()
    }

    #[inline]
    pub fn collider_groups(&self) -> &[u32] {
        &self.collider_groups
    }

    #[inline]
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// 恢复初始状态
    #[inline]
    pub fn reset(&mut self) {
        self.state = self.initial_state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_axis_in_bone_space() {
        // 骨骼绕 Z 旋转 90°，尾端在世界 +Y 方向 → 本地 +X
        let rot = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let pose = BindPose {
            local_rotation: rot,
            head: Vec3::ZERO,
            head_rotation: rot,
            tail: Vec3::new(0.0, 0.2, 0.0),
        };
        let node = SpringNode::new(0, None, pose, NodeParams::default(), None, Vec::new());
        assert!((node.rest().bone_axis - Vec3::X).length() < 1e-5);
        assert!((node.rest().length - 0.2).abs() < 1e-6);
        assert!(!node.has_center());
    }

    #[test]
    fn test_center_space_state() {
        let center = CenterMatrix::from_world(Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        let pose = BindPose {
            local_rotation: Quat::IDENTITY,
            head: Vec3::new(5.0, 1.0, 0.0),
            head_rotation: Quat::IDENTITY,
            tail: Vec3::new(5.0, 0.9, 0.0),
        };
        let node = SpringNode::new(0, None, pose, NodeParams::default(), Some((0, center)), Vec::new());
        assert_eq!(node.center(), Some(0));
        assert!((node.state().current_tail - Vec3::new(0.0, 0.9, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_params_sanitized() {
        let params = NodeParams {
            drag: 3.0,
            gravity_dir: Vec3::new(0.0, -2.0, 0.0),
            ..NodeParams::default()
        };
        let pose = BindPose {
            local_rotation: Quat::IDENTITY,
            head: Vec3::ZERO,
            head_rotation: Quat::IDENTITY,
            tail: Vec3::X,
        };
        let node = SpringNode::new(0, None, pose, params, None, Vec::new());
        assert_eq!(node.params().drag, 1.0);
        assert!((node.params().gravity_dir - Vec3::NEG_Y).length() < 1e-6);
    }
}
