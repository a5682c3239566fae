//! 骨骼节点
//!
//! BoneLink 是骨骼层级中的单个变换节点。
//! Spring Bone 求解器只读取父骨骼姿态、只写入自身节点的本地旋转。

use glam::{Mat4, Quat, Vec3};
use bitflags::bitflags;

use super::BoneTransform;

// ============================================================================
// 骨骼标志
// ============================================================================

bitflags! {
    /// 骨骼标志位（由实例聚合器在初始化时写入）
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BoneFlags: u32 {
        /// 旋转由 Spring Bone 驱动
        const SPRING = 1 << 0;
        /// 被用作 Center 参考系
        const CENTER = 1 << 1;
        /// 挂载了碰撞体组
        const COLLIDER = 1 << 2;
    }
}

// ============================================================================
// 骨骼节点
// ============================================================================

/// 骨骼节点
///
/// - 静态数据：名称、父子关系、初始姿态
/// - 动态数据：每帧由动画写入的本地变换，以及缓存的世界矩阵
/// - 变换计算：local_to_world = parent.local_to_world * local_to_parent
#[derive(Clone, Debug)]
pub struct BoneLink {
    // ========================================
    // 静态数据（初始化后不变）
    // ========================================

    /// 骨骼名称
    pub name: String,

    /// 父骨骼索引 (-1 表示根骨骼)
    pub parent_index: i32,

    /// 骨骼标志
    pub flags: BoneFlags,

    /// 初始本地姿态（reset 时恢复）
    pub initial: BoneTransform,

    // ========================================
    // 动态数据（每帧更新）
    // ========================================

    /// 本地平移
    pub translation: Vec3,

    /// 本地旋转
    pub rotation: Quat,

    /// 本地缩放
    pub scale: Vec3,

    /// 本地变换矩阵 (local_to_parent)
    pub local_to_parent: Mat4,

    /// 全局变换矩阵 (local_to_world)
    pub local_to_world: Mat4,
}

impl BoneLink {
    /// 创建新骨骼
    pub fn new(name: String) -> Self {
        Self {
            name,
            parent_index: -1,
            flags: BoneFlags::empty(),
            initial: BoneTransform::default(),
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            local_to_parent: Mat4::IDENTITY,
            local_to_world: Mat4::IDENTITY,
        }
    }

    /// 以给定本地姿态创建骨骼
    pub fn with_transform(name: String, transform: BoneTransform) -> Self {
        let mut bone = Self::new(name);
        bone.initial = transform;
        bone.translation = transform.translation;
        bone.rotation = transform.rotation;
        bone.scale = transform.scale;
        bone.compute_local_transform();
        bone
    }

    // ========================================
    // 访问器
    // ========================================

    /// 父骨骼索引
    #[inline]
    pub fn parent_id(&self) -> Option<usize> {
        if self.parent_index >= 0 {
            Some(self.parent_index as usize)
        } else {
            None
        }
    }

    /// 获取世界位置
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.local_to_world.w_axis.truncate()
    }

    /// 获取世界旋转（去除缩放）
    #[inline]
    pub fn world_rotation(&self) -> Quat {
        let (_, rotation, _) = self.local_to_world.to_scale_rotation_translation();
        rotation
    }

    // ========================================
    // 变换计算
    // ========================================

    /// 计算本地变换 (local_to_parent)
    #[inline]
    pub fn compute_local_transform(&mut self) {
        self.local_to_parent =
            Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation);
    }

    // ========================================
    // 标志检查方法
    // ========================================

    #[inline]
    pub fn is_spring_driven(&self) -> bool {
        self.flags.contains(BoneFlags::SPRING)
    }

    #[inline]
    pub fn has_collider(&self) -> bool {
        self.flags.contains(BoneFlags::COLLIDER)
    }
}

impl Default for BoneLink {
    fn default() -> Self {
        Self::new(String::new())
    }
}
