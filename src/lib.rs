//! Spring Bone 引擎 - 批量并行的二次运动物理求解器
//!
//! 模块划分：
//! - skeleton: 骨骼层级（变换树），充当宿主引擎的 Transform
//! - physics: Spring Bone 节点、碰撞体组、实例聚合器、全局调度器
//!
//! 典型用法：
//! 1. 宿主构建 `Skeleton` 并挂上 `SpringBoneSettings`
//! 2. `SpringBoneScheduler::add_instance` 注册
//! 3. 每帧写入动画姿态后调用 `update(dt)`，下一帧开始时结果已写回骨骼

pub mod skeleton;
pub mod physics;

pub use skeleton::{BoneLink, BoneSet, BoneTransform, SharedSkeleton, Skeleton};
pub use physics::{
    ColliderGroup, InstanceHandle, SphereCollider, SpringBoneConfig, SpringBoneInstance,
    SpringBoneScheduler, SpringBoneSettings,
};

use thiserror::Error;

/// 引擎错误类型
#[derive(Debug, Error)]
pub enum SpringBoneError {
    /// 线程池创建失败
    #[error("failed to build spring bone worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// 设置中引用了不存在的骨骼
    #[error("spring bone settings '{settings}' reference bone {bone} but skeleton has {bone_count} bones")]
    InvalidBone {
        settings: String,
        bone: usize,
        bone_count: usize,
    },

    /// 父骨骼必须先于子骨骼加入
    #[error("bone '{bone}' references parent {parent} which does not exist yet")]
    InvalidParent {
        bone: String,
        parent: usize,
    },

    /// 工作线程在执行管线时 panic，帧数据丢失
    #[error("spring bone pipeline was lost before completion")]
    PipelineLost,
}

/// Result 别名
pub type Result<T> = std::result::Result<T, SpringBoneError>;
