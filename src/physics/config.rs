//! Spring Bone 配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。

use once_cell::sync::Lazy;
use std::sync::RwLock;

use glam::Vec3;

/// Spring Bone 配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct SpringBoneConfig {
    // ========== 线程 ==========
    /// 工作线程数，0 表示由 rayon 按 CPU 核数决定
    pub worker_threads: usize,

    // ========== 时间步 ==========
    /// 单帧最大时间步（秒），超出部分被截断
    pub max_delta_time: f32,

    // ========== 模拟 ==========
    /// 叶骨骼的虚拟尾端长度，默认 0.07
    pub leaf_tail_length: f32,
    /// 全局外力（风等），与各节点重力相加
    pub external_force: Vec3,
    /// 是否启用碰撞，默认 true
    pub collision_enabled: bool,

    // ========== 调试 ==========
    /// 是否启用模拟，false 时 update 保持上一帧姿态
    pub enabled: bool,
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for SpringBoneConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,

            // 最低 20 FPS
            max_delta_time: 0.05,

            leaf_tail_length: 0.07,
            external_force: Vec3::ZERO,
            collision_enabled: true,

            enabled: true,
            debug_log: false,
        }
    }
}

/// 全局配置实例
static SPRING_BONE_CONFIG: Lazy<RwLock<SpringBoneConfig>> = Lazy::new(|| {
    RwLock::new(SpringBoneConfig::default())
});

/// 获取当前配置（只读）
pub fn get_config() -> SpringBoneConfig {
    SPRING_BONE_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: SpringBoneConfig) {
    *SPRING_BONE_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *SPRING_BONE_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = SpringBoneConfig::default();
}
