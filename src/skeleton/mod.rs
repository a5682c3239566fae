//! 骨骼系统
//!
//! 核心设计思想：
//! - BoneLink: 单个骨骼节点（变换）
//! - BoneSet: 管理骨骼层次结构，并携带该骨骼上的 Spring Bone 设置
//! - SharedSkeleton: 宿主与调度器共享的句柄，作业线程通过它写回旋转

mod bone_link;
mod bone_set;

pub use bone_link::{BoneLink, BoneFlags};
pub use bone_set::BoneSet;

use std::sync::{Arc, RwLock};

use glam::{Vec3, Quat};

// ============================================================================
// 公共类型定义
// ============================================================================

/// 骨骼变换数据
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl BoneTransform {
    /// 仅平移
    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::default() }
    }
}

// ============================================================================
// 类型别名
// ============================================================================

/// Skeleton 别名
pub type Skeleton = BoneSet;

/// 共享骨骼句柄（注册实例时按指针判重）
pub type SharedSkeleton = Arc<RwLock<BoneSet>>;
