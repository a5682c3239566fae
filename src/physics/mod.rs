//! Spring Bone 物理系统
//!
//! - config: 全局配置
//! - collider: 球形碰撞体、碰撞体组、按组索引的查找表
//! - node / kernel: 单个节点的数据与 Verlet 积分内核
//! - instance: 单个骨骼实例的节点聚合器
//! - pipeline: 三阶段帧作业（碰撞哈希 → 父旋转快照 → 积分写回）
//! - scheduler: 全局调度器，每帧派发一次作业
//! - debug: 只读调试可视化

mod collider;
mod config;
mod debug;
mod instance;
mod kernel;
mod node;
mod pipeline;
mod scheduler;

pub use collider::{ColliderGroup, ColliderLookup, SphereCollider, WorldSphere};
pub use config::{get_config, reset_config, set_config, SpringBoneConfig};
pub use debug::{
    DebugColor, DebugDrawData, DebugDrawFlags, DebugLine, DebugSphere, DebugSnapshot, NodeDebug,
};
pub use instance::{SpringBoneInstance, SpringBoneSettings};
pub use kernel::{from_to_rotation, project_to_length, resolve_sphere, step_node, NodePose, StepParams};
pub use node::{BindPose, CenterMatrix, NodeParams, NodeRest, NodeState, SpringNode};
pub use pipeline::{Phase, PhaseSet};
pub use scheduler::{InstanceHandle, SpringBoneScheduler};
